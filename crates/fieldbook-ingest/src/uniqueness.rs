//! Uniqueness of answers across sibling entries

use fieldbook_core::rules::datetime::format_for_comparison;
use fieldbook_core::{EntryStructure, InputType, Uniqueness};
use fieldbook_storage::{AnswerQuery, AnswerScope, EntryStore, StorageResult};
use serde_json::Value;

/// Compares one answer against the stored answers of the same input
pub struct UniquenessChecker<'a, S: EntryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: EntryStore + ?Sized> UniquenessChecker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Whether `answer` is unused among the entries `uniqueness` scopes to
    ///
    /// Branch entries compare across every owner of the branch input.
    /// `hierarchy` narrows form entries to siblings under the same parent;
    /// for top-level forms that is the whole form.
    pub async fn is_unique(
        &self,
        structure: &EntryStructure,
        uniqueness: Uniqueness,
        input_ref: &str,
        answer: &Value,
        input_type: InputType,
        datetime_format: Option<&str>,
    ) -> StorageResult<bool> {
        let scope = match uniqueness {
            Uniqueness::None => return Ok(true),
            _ if structure.is_branch() => match structure.owner_input_ref.as_deref() {
                Some(owner_input_ref) => AnswerScope::Branch { owner_input_ref },
                None => return Ok(true),
            },
            Uniqueness::Form => AnswerScope::Form {
                form_ref: &structure.form_ref,
                parent_uuid: None,
            },
            Uniqueness::Hierarchy => AnswerScope::Form {
                form_ref: &structure.form_ref,
                parent_uuid: structure.parent_uuid.as_deref(),
            },
        };

        let query = AnswerQuery {
            project_id: &structure.project_id,
            scope,
            input_ref,
            exclude_uuid: &structure.entry_uuid,
        };
        let stored = self.store.find_answers(&query).await?;

        let wanted = comparison_key(answer, input_type, datetime_format);
        let clash = stored
            .iter()
            .any(|other| comparison_key(other, input_type, datetime_format) == wanted);
        if clash {
            tracing::debug!(input_ref, entry = %structure.entry_uuid, "answer already taken");
        }
        Ok(!clash)
    }
}

/// The value two answers are considered equal on
///
/// Dates and times are rendered through the input's display format, so two
/// timestamps falling on the same displayed day clash. Strings compare
/// trimmed and case-sensitive; arrays compare as sets.
pub fn comparison_key(answer: &Value, input_type: InputType, datetime_format: Option<&str>) -> String {
    match answer {
        Value::String(s) if input_type.is_datetime() => format_for_comparison(s, datetime_format),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Value::Array(items) => {
            let mut keys: Vec<String> = items
                .iter()
                .map(|item| comparison_key(item, input_type, datetime_format))
                .collect();
            keys.sort();
            keys.dedup();
            keys.join("\u{1f}")
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
