//! Answer validation stage and entry titles

use fieldbook_core::rules::datetime::format_for_comparison;
use fieldbook_core::rules::{is_empty_answer, rule_for};
use fieldbook_core::{AnswerValue, EntryStructure, ErrorCode, InputExtra, InputType, ProjectExtra, Uniqueness};
use fieldbook_storage::EntryStore;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::Rejection;
use crate::uniqueness::UniquenessChecker;

/// Flatten a form or branch list, expanding group members in place
pub fn expand_groups<'e>(extra: &'e ProjectExtra, input_refs: &[String]) -> Vec<&'e InputExtra> {
    let mut flat = Vec::with_capacity(input_refs.len());
    for input_ref in input_refs {
        let Some(input) = extra.input(input_ref) else {
            continue;
        };
        flat.push(input);
        if input.input_type() == InputType::Group {
            for member in extra.group_inputs(input_ref).unwrap_or(&[]) {
                if let Some(member) = extra.input(member) {
                    flat.push(member);
                }
            }
        }
    }
    flat
}

/// Validates and normalizes the answers of one upload, failing on the first
/// offending input
pub struct AnswerValidator<'a, S: EntryStore + ?Sized> {
    store: &'a S,
    extra: &'a ProjectExtra,
}

impl<'a, S: EntryStore + ?Sized> AnswerValidator<'a, S> {
    pub fn new(store: &'a S, extra: &'a ProjectExtra) -> Self {
        Self { store, extra }
    }

    /// Check every input of `input_refs` and rewrite the answers in place
    ///
    /// Answers for refs outside the list are dropped. On success the
    /// structure's title is set.
    pub async fn validate(&self, structure: &mut EntryStructure, input_refs: &[String]) -> Result<(), Rejection> {
        let inputs = expand_groups(self.extra, input_refs);
        let checker = UniquenessChecker::new(self.store);

        for input in &inputs {
            let input_ref = input.data.input_ref.as_str();
            let input_type = input.input_type();

            if !input_type.takes_answer() {
                let was_jumped = structure.answer(input_ref).map(|a| a.was_jumped).unwrap_or(false);
                structure.answers.insert(
                    input_ref.to_string(),
                    AnswerValue {
                        answer: Value::String(String::new()),
                        was_jumped,
                    },
                );
                continue;
            }

            let Some(given) = structure.answer(input_ref) else {
                return Err(Rejection::new(input_ref, ErrorCode::AnswerMissing));
            };

            if given.was_jumped {
                structure.answers.insert(input_ref.to_string(), AnswerValue::jumped());
                continue;
            }

            if is_empty_answer(&given.answer) {
                if input.data.is_required {
                    return Err(Rejection::new(input_ref, ErrorCode::AnswerRequired));
                }
                continue;
            }

            let raw = given.answer.clone();
            let normalized = rule_for(input_type).validate(&raw, &input.data);

            if input.data.uniqueness != Uniqueness::None {
                let compared = normalized.as_ref().unwrap_or(&raw);
                let unique = checker
                    .is_unique(
                        structure,
                        input.data.uniqueness,
                        input_ref,
                        compared,
                        input_type,
                        input.data.datetime_format.as_deref(),
                    )
                    .await?;
                if !unique {
                    return Err(Rejection::new(input_ref, ErrorCode::AnswerNotUnique));
                }
            }

            let value = normalized.map_err(|code| {
                tracing::debug!(input_ref, code = %code, "answer rejected");
                Rejection::new(input_ref, code)
            })?;
            structure.set_answer(input_ref, value);
        }

        let known: HashSet<&str> = inputs.iter().map(|i| i.data.input_ref.as_str()).collect();
        structure.answers.retain(|input_ref, _| known.contains(input_ref.as_str()));

        structure.title = entry_title(structure, &inputs);
        Ok(())
    }
}

/// Non-empty title answers joined with a space, or the entry UUID
pub fn entry_title(structure: &EntryStructure, inputs: &[&InputExtra]) -> String {
    let parts: Vec<String> = inputs
        .iter()
        .filter(|input| input.data.is_title)
        .filter_map(|input| {
            let answer = structure.answer(&input.data.input_ref)?;
            if answer.was_jumped || is_empty_answer(&answer.answer) {
                return None;
            }
            let text = title_text(input, &answer.answer);
            (!text.is_empty()).then_some(text)
        })
        .collect();

    if parts.is_empty() {
        structure.entry_uuid.clone()
    } else {
        parts.join(" ")
    }
}

fn title_text(input: &InputExtra, answer: &Value) -> String {
    let label = |answer_ref: &str| {
        input
            .data
            .possible_answers
            .iter()
            .find(|a| a.answer_ref == answer_ref)
            .map(|a| a.answer.clone())
            .unwrap_or_else(|| answer_ref.to_string())
    };

    match answer {
        Value::String(s) if input.input_type().is_choice() => label(s),
        Value::String(s) if input.input_type().is_datetime() => {
            format_for_comparison(s, input.data.datetime_format.as_deref())
        }
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(label)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
