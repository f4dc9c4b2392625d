use serde_json::Value;

use super::InputRule;
use crate::codes::ErrorCode;
use crate::definition::Input;

fn member(answer: &Value, input: &Input) -> Result<String, ErrorCode> {
    let answer_ref = answer.as_str().map(str::trim).ok_or(ErrorCode::AnswerTypeInvalid)?;
    if !input.has_possible_answer(answer_ref) {
        return Err(ErrorCode::AnswerNotInPossibleAnswers);
    }
    Ok(answer_ref.to_string())
}

/// `radio` and `dropdown`: one answer ref
pub struct SingleChoiceRule;

impl InputRule for SingleChoiceRule {
    fn validate(&self, answer: &Value, input: &Input) -> Result<Value, ErrorCode> {
        member(answer, input).map(Value::String)
    }
}

/// `checkbox` and the search types: a list of answer refs
pub struct MultiChoiceRule {
    max_selected: Option<usize>,
}

impl MultiChoiceRule {
    pub const fn new(max_selected: Option<usize>) -> Self {
        Self { max_selected }
    }
}

impl InputRule for MultiChoiceRule {
    fn validate(&self, answer: &Value, input: &Input) -> Result<Value, ErrorCode> {
        let items = answer.as_array().ok_or(ErrorCode::AnswerTypeInvalid)?;

        let mut selected: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let answer_ref = member(item, input)?;
            if !selected.contains(&answer_ref) {
                selected.push(answer_ref);
            }
        }

        if let Some(max) = self.max_selected {
            if selected.len() > max {
                return Err(ErrorCode::AnswerTypeInvalid);
            }
        }
        Ok(Value::from(selected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::InputType;
    use serde_json::json;

    const A: &str = "aaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbb";

    fn choices(input_type: InputType) -> Input {
        Input::new("c", input_type, "Pick").with_answer(A, "A").with_answer(B, "B")
    }

    #[test]
    fn test_single_choice() {
        let input = choices(InputType::Radio);
        assert_eq!(SingleChoiceRule.validate(&json!(A), &input), Ok(json!(A)));
        assert_eq!(
            SingleChoiceRule.validate(&json!("zzzzzzzzzzzzz"), &input),
            Err(ErrorCode::AnswerNotInPossibleAnswers)
        );
        assert_eq!(SingleChoiceRule.validate(&json!([A]), &input), Err(ErrorCode::AnswerTypeInvalid));
    }

    #[test]
    fn test_multi_choice_dedups() {
        let input = choices(InputType::Checkbox);
        let rule = MultiChoiceRule::new(None);
        assert_eq!(rule.validate(&json!([B, A, B]), &input), Ok(json!([B, A])));
        assert_eq!(rule.validate(&json!([A, "nope"]), &input), Err(ErrorCode::AnswerNotInPossibleAnswers));
        assert_eq!(rule.validate(&json!(A), &input), Err(ErrorCode::AnswerTypeInvalid));
    }

    #[test]
    fn test_search_single_allows_one() {
        let input = choices(InputType::SearchSingle);
        let rule = MultiChoiceRule::new(Some(1));
        assert_eq!(rule.validate(&json!([A]), &input), Ok(json!([A])));
        assert_eq!(rule.validate(&json!([A, B]), &input), Err(ErrorCode::AnswerTypeInvalid));
    }
}
