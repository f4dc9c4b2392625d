use serde_json::Value;
use uuid::Uuid;

use super::InputRule;
use crate::codes::ErrorCode;
use crate::definition::{Input, InputType};

/// Extensions accepted per media type
pub fn allowed_extensions(input_type: InputType) -> &'static [&'static str] {
    match input_type {
        InputType::Photo => &["jpg", "jpeg"],
        InputType::Video => &["mp4"],
        InputType::Audio => &["mp4", "m4a", "wav"],
        _ => &[],
    }
}

/// Whether `name` is `<entry uuid>_<timestamp>.<ext>` for this media type
pub fn is_valid_file_name(name: &str, input_type: InputType) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if !allowed_extensions(input_type).contains(&ext.to_ascii_lowercase().as_str()) {
        return false;
    }
    let Some((uuid, stamp)) = stem.rsplit_once('_') else {
        return false;
    };
    Uuid::parse_str(uuid).is_ok() && !stamp.is_empty() && stamp.chars().all(|c| c.is_ascii_digit())
}

/// `photo`, `video` and `audio`: the stored file name
pub struct MediaRule;

impl InputRule for MediaRule {
    fn validate(&self, answer: &Value, input: &Input) -> Result<Value, ErrorCode> {
        let name = answer.as_str().map(str::trim).ok_or(ErrorCode::AnswerTypeInvalid)?;
        if !is_valid_file_name(name, input.input_type) {
            return Err(ErrorCode::AnswerFileNameInvalid);
        }
        Ok(Value::String(name.to_string()))
    }
}
