//! Per-input definition rules (type specific)

use std::collections::HashSet;

use crate::codes::{CodedError, ErrorCode};
use crate::definition::{Input, InputType, Uniqueness};
use crate::limits::{
    ProjectLimits, ANSWER_REF_LEN, MAX_POSSIBLE_ANSWER_LEN, MAX_QUESTION_LEN, MAX_README_LEN,
};
use crate::rules::datetime::{DATE_FORMATS, TIME_FORMATS};

type CheckResult = Result<(), CodedError>;

fn fail(input: &Input, code: ErrorCode) -> CheckResult {
    Err(CodedError::new(&input.input_ref, code))
}

/// Refs are `<owner_ref>_<suffix>` with an alphanumeric/underscore suffix
pub fn is_valid_ref(candidate: &str, owner_ref: &str) -> bool {
    let Some(suffix) = candidate
        .strip_prefix(owner_ref)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };
    !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn check_question(input: &Input) -> CheckResult {
    let question = input.question.trim();
    if question.is_empty() {
        return fail(input, ErrorCode::QuestionMissing);
    }
    let max = if input.input_type == InputType::Readme {
        MAX_README_LEN
    } else {
        MAX_QUESTION_LEN
    };
    if question.chars().count() > max {
        return fail(input, ErrorCode::QuestionTooLong);
    }
    Ok(())
}

pub fn check_possible_answers(input: &Input, limits: &ProjectLimits) -> CheckResult {
    if !input.input_type.is_choice() {
        return Ok(());
    }

    let max = if input.input_type.is_search() {
        limits.search_possible_answers
    } else {
        limits.possible_answers
    };

    if input.possible_answers.is_empty() {
        return fail(input, ErrorCode::PossibleAnswersMissing);
    }
    if input.possible_answers.len() > max {
        return fail(input, ErrorCode::TooManyPossibleAnswers);
    }

    let mut seen = HashSet::new();
    for answer in &input.possible_answers {
        let answer_ref = answer.answer_ref.as_str();
        if answer_ref.len() != ANSWER_REF_LEN || !answer_ref.chars().all(|c| c.is_ascii_alphanumeric()) {
            return fail(input, ErrorCode::AnswerRefInvalid);
        }
        if !seen.insert(answer_ref) {
            return fail(input, ErrorCode::AnswerRefDuplicate);
        }
        let text = answer.answer.trim();
        if text.is_empty() || text.chars().count() > MAX_POSSIBLE_ANSWER_LEN {
            return fail(input, ErrorCode::PossibleAnswerTextInvalid);
        }
    }
    Ok(())
}

pub fn check_datetime_format(input: &Input) -> CheckResult {
    let allowed: &[&str] = match input.input_type {
        InputType::Date => DATE_FORMATS,
        InputType::Time => TIME_FORMATS,
        _ => return Ok(()),
    };
    match input.datetime_format.as_deref() {
        Some(format) if allowed.contains(&format) => Ok(()),
        _ => fail(input, ErrorCode::DatetimeFormatInvalid),
    }
}

pub fn check_numeric(input: &Input) -> CheckResult {
    if !input.input_type.is_numeric() {
        return Ok(());
    }
    let integer = input.input_type == InputType::Integer;

    for bound in [input.min, input.max].into_iter().flatten() {
        if !bound.is_finite() || (integer && bound.fract() != 0.0) {
            return fail(input, ErrorCode::NumericRangeInvalid);
        }
    }
    if let (Some(min), Some(max)) = (input.min, input.max) {
        if min > max {
            return fail(input, ErrorCode::NumericRangeInvalid);
        }
    }

    let Some(default) = input.default.as_deref().map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(());
    };
    let value = if integer {
        default.parse::<i64>().ok().map(|v| v as f64)
    } else {
        default.parse::<f64>().ok().filter(|v| v.is_finite())
    };
    let Some(value) = value else {
        return fail(input, ErrorCode::DefaultInvalid);
    };
    if input.min.map(|min| value < min).unwrap_or(false) || input.max.map(|max| value > max).unwrap_or(false) {
        return fail(input, ErrorCode::DefaultOutOfRange);
    }
    Ok(())
}

pub fn check_uniqueness(input: &Input, in_branch: bool) -> CheckResult {
    match input.uniqueness {
        Uniqueness::None => Ok(()),
        _ if !input.input_type.can_be_unique() => fail(input, ErrorCode::UniquenessNotAllowed),
        Uniqueness::Hierarchy if in_branch => fail(input, ErrorCode::HierarchyUniquenessInBranch),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(result: CheckResult) -> Option<ErrorCode> {
        result.err().map(|e| e.code)
    }

    #[test]
    fn test_ref_format() {
        assert!(is_valid_ref("p_f1", "p"));
        assert!(is_valid_ref("p_f1_5a1b", "p_f1"));
        assert!(!is_valid_ref("p_f1", "p_f1"));
        assert!(!is_valid_ref("p_f1_", "p_f1"));
        assert!(!is_valid_ref("q_f1_x", "p_f1"));
        assert!(!is_valid_ref("p_f1_a b", "p_f1"));
    }

    #[test]
    fn test_question_rules() {
        assert!(check_question(&Input::new("r", InputType::Text, "Name?")).is_ok());
        assert_eq!(code_of(check_question(&Input::new("r", InputType::Text, "  "))), Some(ErrorCode::QuestionMissing));
        let long = "x".repeat(MAX_QUESTION_LEN + 1);
        assert_eq!(code_of(check_question(&Input::new("r", InputType::Text, long.clone()))), Some(ErrorCode::QuestionTooLong));
        assert!(check_question(&Input::new("r", InputType::Readme, long)).is_ok());
    }

    #[test]
    fn test_possible_answers() {
        let limits = ProjectLimits::default();
        let radio = Input::new("r", InputType::Radio, "Pick");
        assert_eq!(code_of(check_possible_answers(&radio, &limits)), Some(ErrorCode::PossibleAnswersMissing));

        let ok = radio.clone().with_answer("5a1b2c3d4e5f6", "One");
        assert!(check_possible_answers(&ok, &limits).is_ok());

        let short_ref = radio.clone().with_answer("abc", "One");
        assert_eq!(code_of(check_possible_answers(&short_ref, &limits)), Some(ErrorCode::AnswerRefInvalid));

        let dup = ok.clone().with_answer("5a1b2c3d4e5f6", "Two");
        assert_eq!(code_of(check_possible_answers(&dup, &limits)), Some(ErrorCode::AnswerRefDuplicate));

        let empty_text = radio.with_answer("5a1b2c3d4e5f6", " ");
        assert_eq!(code_of(check_possible_answers(&empty_text, &limits)), Some(ErrorCode::PossibleAnswerTextInvalid));

        let mut too_many = Input::new("r", InputType::Dropdown, "Pick");
        for i in 0..3 {
            too_many = too_many.with_answer(format!("{:013}", i), "x");
        }
        let tight = ProjectLimits { possible_answers: 2, ..ProjectLimits::default() };
        assert_eq!(code_of(check_possible_answers(&too_many, &tight)), Some(ErrorCode::TooManyPossibleAnswers));
    }

    #[test]
    fn test_datetime_format_required() {
        let date = Input::new("d", InputType::Date, "When");
        assert_eq!(code_of(check_datetime_format(&date)), Some(ErrorCode::DatetimeFormatInvalid));
        assert!(check_datetime_format(&date.clone().with_datetime_format("dd/MM/YYYY")).is_ok());
        assert_eq!(
            code_of(check_datetime_format(&date.with_datetime_format("HH:mm"))),
            Some(ErrorCode::DatetimeFormatInvalid)
        );
        assert!(check_datetime_format(&Input::new("t", InputType::Time, "At").with_datetime_format("HH:mm")).is_ok());
    }

    #[test]
    fn test_numeric_defaults() {
        let int = Input::new("i", InputType::Integer, "How many").with_range(Some(0.0), Some(10.0));
        assert!(check_numeric(&int.clone().with_default("5")).is_ok());
        assert_eq!(code_of(check_numeric(&int.clone().with_default("11"))), Some(ErrorCode::DefaultOutOfRange));
        assert_eq!(code_of(check_numeric(&int.clone().with_default("2.5"))), Some(ErrorCode::DefaultInvalid));
        assert_eq!(
            code_of(check_numeric(&int.with_range(Some(10.0), Some(1.0)))),
            Some(ErrorCode::NumericRangeInvalid)
        );

        let dec = Input::new("d", InputType::Decimal, "Weight").with_range(Some(0.5), None);
        assert!(check_numeric(&dec.clone().with_default("2.5")).is_ok());
        assert_eq!(code_of(check_numeric(&dec.with_default("0.1"))), Some(ErrorCode::DefaultOutOfRange));
    }

    #[test]
    fn test_uniqueness_rules() {
        let text = Input::new("t", InputType::Text, "Code");
        assert!(check_uniqueness(&text.clone().unique(Uniqueness::Form), true).is_ok());
        assert!(check_uniqueness(&text.clone().unique(Uniqueness::Hierarchy), false).is_ok());
        assert_eq!(
            code_of(check_uniqueness(&text.unique(Uniqueness::Hierarchy), true)),
            Some(ErrorCode::HierarchyUniquenessInBranch)
        );
        let photo = Input::new("p", InputType::Photo, "Pic").unique(Uniqueness::Form);
        assert_eq!(code_of(check_uniqueness(&photo, false)), Some(ErrorCode::UniquenessNotAllowed));
    }
}
