//! Per-type answer rules
//!
//! Each [`InputType`] maps to exactly one [`InputRule`] through [`rule_for`].
//! A rule both validates and normalizes: the returned value is what gets
//! stored. Rules are only run on non-empty answers; the required check and
//! empty handling live in the ingestion pipeline.

pub mod choice;
pub mod datetime;
pub mod location;
pub mod media;
pub mod numeric;
pub mod phone;
pub mod text;

use serde_json::Value;

use crate::codes::ErrorCode;
use crate::definition::{Input, InputType};

/// Validates and normalizes one answer against its input definition
pub trait InputRule: Send + Sync {
    fn validate(&self, answer: &Value, input: &Input) -> Result<Value, ErrorCode>;
}

/// Rule for inputs that never hold a value (containers and readme)
pub struct NoAnswerRule;

impl InputRule for NoAnswerRule {
    fn validate(&self, _answer: &Value, _input: &Input) -> Result<Value, ErrorCode> {
        Ok(Value::String(String::new()))
    }
}

static TEXT: text::TextRule = text::TextRule::new(crate::limits::MAX_TEXT_ANSWER_LEN, true);
static TEXTAREA: text::TextRule = text::TextRule::new(crate::limits::MAX_TEXTAREA_ANSWER_LEN, false);
static INTEGER: numeric::IntegerRule = numeric::IntegerRule;
static DECIMAL: numeric::DecimalRule = numeric::DecimalRule;
static DATETIME: datetime::DatetimeRule = datetime::DatetimeRule;
static SINGLE_CHOICE: choice::SingleChoiceRule = choice::SingleChoiceRule;
static MULTI_CHOICE: choice::MultiChoiceRule = choice::MultiChoiceRule::new(None);
static SEARCH_SINGLE: choice::MultiChoiceRule = choice::MultiChoiceRule::new(Some(1));
static LOCATION: location::LocationRule = location::LocationRule;
static MEDIA: media::MediaRule = media::MediaRule;
static PHONE: phone::PhoneRule = phone::PhoneRule;
static NO_ANSWER: NoAnswerRule = NoAnswerRule;

/// The rule registered for an input type
pub fn rule_for(input_type: InputType) -> &'static dyn InputRule {
    match input_type {
        InputType::Text => &TEXT,
        InputType::Textarea => &TEXTAREA,
        InputType::Integer => &INTEGER,
        InputType::Decimal => &DECIMAL,
        InputType::Date | InputType::Time => &DATETIME,
        InputType::Radio | InputType::Dropdown => &SINGLE_CHOICE,
        InputType::Checkbox | InputType::SearchMultiple => &MULTI_CHOICE,
        InputType::SearchSingle => &SEARCH_SINGLE,
        InputType::Location => &LOCATION,
        InputType::Photo | InputType::Video | InputType::Audio => &MEDIA,
        InputType::Phone => &PHONE,
        InputType::Branch | InputType::Group | InputType::Readme => &NO_ANSWER,
    }
}

/// Whether an answer counts as "not given"
///
/// Location answers with blank coordinates are empty as well.
pub fn is_empty_answer(answer: &Value) -> bool {
    match answer {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_empty_answer),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Scalar answers as trimmed strings; numbers are rendered
pub(crate) fn as_text(answer: &Value) -> Option<String> {
    match answer {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
