use serde_json::{Number, Value};

use super::InputRule;
use crate::codes::ErrorCode;
use crate::definition::Input;

fn check_range(value: f64, input: &Input) -> Result<(), ErrorCode> {
    let below = input.min.map(|min| value < min).unwrap_or(false);
    let above = input.max.map(|max| value > max).unwrap_or(false);
    if below || above {
        return Err(ErrorCode::AnswerOutOfRange);
    }
    Ok(())
}

pub struct IntegerRule;

impl InputRule for IntegerRule {
    fn validate(&self, answer: &Value, input: &Input) -> Result<Value, ErrorCode> {
        let value = match answer {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or(ErrorCode::AnswerNotNumeric)?;

        check_range(value as f64, input)?;
        Ok(Value::from(value))
    }
}

pub struct DecimalRule;

impl InputRule for DecimalRule {
    fn validate(&self, answer: &Value, input: &Input) -> Result<Value, ErrorCode> {
        let value = match answer {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
        .ok_or(ErrorCode::AnswerNotNumeric)?;

        check_range(value, input)?;
        Number::from_f64(value)
            .map(Value::Number)
            .ok_or(ErrorCode::AnswerNotNumeric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::InputType;
    use serde_json::json;

    #[test]
    fn test_integer_coercion_and_range() {
        let input = Input::new("i", InputType::Integer, "Age").with_range(Some(0.0), Some(120.0));
        assert_eq!(IntegerRule.validate(&json!("42"), &input), Ok(json!(42)));
        assert_eq!(IntegerRule.validate(&json!(7), &input), Ok(json!(7)));
        assert_eq!(IntegerRule.validate(&json!("4.5"), &input), Err(ErrorCode::AnswerNotNumeric));
        assert_eq!(IntegerRule.validate(&json!(4.5), &input), Err(ErrorCode::AnswerNotNumeric));
        assert_eq!(IntegerRule.validate(&json!("121"), &input), Err(ErrorCode::AnswerOutOfRange));
        assert_eq!(IntegerRule.validate(&json!(-1), &input), Err(ErrorCode::AnswerOutOfRange));
    }

    #[test]
    fn test_decimal_coercion_and_range() {
        let input = Input::new("d", InputType::Decimal, "Weight").with_range(None, Some(10.0));
        assert_eq!(DecimalRule.validate(&json!("2.5"), &input), Ok(json!(2.5)));
        assert_eq!(DecimalRule.validate(&json!(3), &input), Ok(json!(3.0)));
        assert_eq!(DecimalRule.validate(&json!("abc"), &input), Err(ErrorCode::AnswerNotNumeric));
        assert_eq!(DecimalRule.validate(&json!("NaN"), &input), Err(ErrorCode::AnswerNotNumeric));
        assert_eq!(DecimalRule.validate(&json!(10.5), &input), Err(ErrorCode::AnswerOutOfRange));
    }
}
