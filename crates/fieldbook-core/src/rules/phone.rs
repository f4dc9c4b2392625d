use serde_json::Value;

use super::{as_text, InputRule};
use crate::codes::ErrorCode;
use crate::definition::Input;
use crate::limits::MAX_PHONE_ANSWER_LEN;

pub struct PhoneRule;

impl InputRule for PhoneRule {
    fn validate(&self, answer: &Value, _input: &Input) -> Result<Value, ErrorCode> {
        let phone = as_text(answer).ok_or(ErrorCode::AnswerTypeInvalid)?;
        if phone.chars().count() > MAX_PHONE_ANSWER_LEN {
            return Err(ErrorCode::AnswerTooLong);
        }
        let allowed = phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'));
        if !allowed || !phone.chars().any(|c| c.is_ascii_digit()) {
            return Err(ErrorCode::AnswerPhoneInvalid);
        }
        Ok(Value::String(phone))
    }
}
