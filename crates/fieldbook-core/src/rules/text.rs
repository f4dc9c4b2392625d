use serde_json::Value;

use super::{as_text, InputRule};
use crate::codes::ErrorCode;
use crate::definition::Input;

/// Free text (`text` and `textarea`)
pub struct TextRule {
    max_len: usize,
    reject_html: bool,
}

impl TextRule {
    pub const fn new(max_len: usize, reject_html: bool) -> Self {
        Self { max_len, reject_html }
    }
}

impl InputRule for TextRule {
    fn validate(&self, answer: &Value, _input: &Input) -> Result<Value, ErrorCode> {
        let text = as_text(answer).ok_or(ErrorCode::AnswerTypeInvalid)?;
        if text.chars().count() > self.max_len {
            return Err(ErrorCode::AnswerTooLong);
        }
        if self.reject_html && (text.contains('<') || text.contains('>')) {
            return Err(ErrorCode::AnswerHtmlNotAllowed);
        }
        Ok(Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::InputType;
    use crate::limits::{MAX_TEXTAREA_ANSWER_LEN, MAX_TEXT_ANSWER_LEN};
    use serde_json::json;

    #[test]
    fn test_text_rules() {
        let input = Input::new("t", InputType::Text, "Name");
        let rule = TextRule::new(MAX_TEXT_ANSWER_LEN, true);

        assert_eq!(rule.validate(&json!("  Jo "), &input), Ok(json!("Jo")));
        assert_eq!(rule.validate(&json!(42), &input), Ok(json!("42")));
        assert_eq!(rule.validate(&json!("<b>hi</b>"), &input), Err(ErrorCode::AnswerHtmlNotAllowed));
        assert_eq!(rule.validate(&json!(["a"]), &input), Err(ErrorCode::AnswerTypeInvalid));
        let long = "x".repeat(MAX_TEXT_ANSWER_LEN + 1);
        assert_eq!(rule.validate(&json!(long), &input), Err(ErrorCode::AnswerTooLong));
    }

    #[test]
    fn test_textarea_allows_longer_text() {
        let input = Input::new("t", InputType::Textarea, "Notes");
        let rule = TextRule::new(MAX_TEXTAREA_ANSWER_LEN, false);
        let long = "x".repeat(MAX_TEXT_ANSWER_LEN + 1);
        assert!(rule.validate(&json!(long), &input).is_ok());
        assert_eq!(
            rule.validate(&json!("x".repeat(MAX_TEXTAREA_ANSWER_LEN + 1)), &input),
            Err(ErrorCode::AnswerTooLong)
        );
    }
}
