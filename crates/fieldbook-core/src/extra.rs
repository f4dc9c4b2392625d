//! Compiled, read-only index over a validated project definition
//!
//! Built incrementally by [`crate::DefinitionValidator`] and stored next to
//! the definition. The ingestion pipeline only ever reads it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::definition::{Input, InputType};

/// Index entry for one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputExtra {
    /// The input with nested lists stripped
    pub data: Input,

    /// Form the input ultimately belongs to
    pub form_ref: String,

    /// Enclosing branch, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_ref: Option<String>,

    /// Enclosing group, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_ref: Option<String>,
}

impl InputExtra {
    pub fn input_type(&self) -> InputType {
        self.data.input_type
    }
}

/// Index entry for one form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormExtra {
    pub form_ref: String,
    pub name: String,
    pub position: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Top-level input refs, in order
    pub inputs: Vec<String>,

    /// Branch input ref -> branch input refs, in order
    #[serde(default)]
    pub branches: HashMap<String, Vec<String>>,

    /// Group input ref -> group input refs, in order
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
}

/// The compiled project index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectExtra {
    pub project_ref: String,

    /// Form refs in hierarchy order
    pub form_order: Vec<String>,

    pub forms: HashMap<String, FormExtra>,

    pub inputs: HashMap<String, InputExtra>,

    #[serde(default)]
    pub entries_limits: HashMap<String, u32>,

    /// Title inputs per owner (form or branch ref)
    #[serde(default)]
    pub titles: HashMap<String, usize>,

    #[serde(default)]
    pub search_inputs: usize,

    #[serde(default)]
    pub total_inputs: usize,
}

impl ProjectExtra {
    pub fn new(project_ref: impl Into<String>) -> Self {
        Self {
            project_ref: project_ref.into(),
            ..Default::default()
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Population (validator only)
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn add_form(&mut self, form: FormExtra) {
        self.form_order.push(form.form_ref.clone());
        self.forms.insert(form.form_ref.clone(), form);
    }

    pub(crate) fn add_input(&mut self, input: &Input, form_ref: &str, branch_ref: Option<&str>, group_ref: Option<&str>) {
        let entry = InputExtra {
            data: input.without_children(),
            form_ref: form_ref.to_string(),
            branch_ref: branch_ref.map(str::to_string),
            group_ref: group_ref.map(str::to_string),
        };
        self.inputs.insert(input.input_ref.clone(), entry);
        self.total_inputs += 1;

        let Some(form) = self.forms.get_mut(form_ref) else {
            return;
        };
        match (branch_ref, group_ref) {
            (_, Some(group)) => form.groups.entry(group.to_string()).or_default().push(input.input_ref.clone()),
            (Some(branch), None) => form.branches.entry(branch.to_string()).or_default().push(input.input_ref.clone()),
            (None, None) => form.inputs.push(input.input_ref.clone()),
        }
    }

    pub(crate) fn add_title(&mut self, owner_ref: &str) -> usize {
        let count = self.titles.entry(owner_ref.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub(crate) fn add_search_input(&mut self) -> usize {
        self.search_inputs += 1;
        self.search_inputs
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    pub fn form(&self, form_ref: &str) -> Option<&FormExtra> {
        self.forms.get(form_ref)
    }

    pub fn input(&self, input_ref: &str) -> Option<&InputExtra> {
        self.inputs.get(input_ref)
    }

    pub fn has_input(&self, input_ref: &str) -> bool {
        self.inputs.contains_key(input_ref)
    }

    /// Top-level inputs of a form
    pub fn form_inputs(&self, form_ref: &str) -> &[String] {
        self.forms.get(form_ref).map(|f| f.inputs.as_slice()).unwrap_or(&[])
    }

    /// Inputs of a branch, `None` if `branch_ref` is not a branch
    pub fn branch_inputs(&self, branch_ref: &str) -> Option<&[String]> {
        let input = self.inputs.get(branch_ref)?;
        if input.input_type() != InputType::Branch {
            return None;
        }
        self.forms
            .get(&input.form_ref)?
            .branches
            .get(branch_ref)
            .map(|v| v.as_slice())
    }

    /// Inputs of a group, `None` if `group_ref` is not a group
    pub fn group_inputs(&self, group_ref: &str) -> Option<&[String]> {
        let input = self.inputs.get(group_ref)?;
        if input.input_type() != InputType::Group {
            return None;
        }
        self.forms
            .get(&input.form_ref)?
            .groups
            .get(group_ref)
            .map(|v| v.as_slice())
    }

    /// Branch input refs declared at the top level of a form
    pub fn form_branches(&self, form_ref: &str) -> Vec<&str> {
        self.form_inputs(form_ref)
            .iter()
            .filter(|r| {
                self.inputs
                    .get(r.as_str())
                    .map(|i| i.input_type() == InputType::Branch)
                    .unwrap_or(false)
            })
            .map(|r| r.as_str())
            .collect()
    }

    /// Whether `input_ref` is a branch declared in `form_ref`
    pub fn is_branch_of(&self, form_ref: &str, input_ref: &str) -> bool {
        self.inputs
            .get(input_ref)
            .map(|i| i.input_type() == InputType::Branch && i.form_ref == form_ref)
            .unwrap_or(false)
    }

    /// Configured quota for a form or branch ref; `None` means unlimited
    pub fn entries_limit(&self, owner_ref: &str) -> Option<u32> {
        self.entries_limits.get(owner_ref).copied()
    }

    pub fn title_count(&self, owner_ref: &str) -> usize {
        self.titles.get(owner_ref).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProjectExtra {
        let mut extra = ProjectExtra::new("p");
        extra.add_form(FormExtra {
            form_ref: "p_f1".into(),
            name: "One".into(),
            position: 0,
            parent: None,
            inputs: Vec::new(),
            branches: HashMap::new(),
            groups: HashMap::new(),
        });
        extra.add_input(&Input::new("p_f1_a", InputType::Text, "A"), "p_f1", None, None);
        extra.add_input(&Input::new("p_f1_b", InputType::Branch, "B"), "p_f1", None, None);
        extra.add_input(&Input::new("p_f1_b_x", InputType::Integer, "X"), "p_f1", Some("p_f1_b"), None);
        extra.add_input(&Input::new("p_f1_b_g", InputType::Group, "G"), "p_f1", Some("p_f1_b"), None);
        extra.add_input(&Input::new("p_f1_b_g_y", InputType::Text, "Y"), "p_f1", Some("p_f1_b"), Some("p_f1_b_g"));
        extra
    }

    #[test]
    fn test_lists_are_kept_per_level() {
        let extra = sample();
        assert_eq!(extra.form_inputs("p_f1"), ["p_f1_a", "p_f1_b"]);
        assert_eq!(extra.branch_inputs("p_f1_b").unwrap(), ["p_f1_b_x", "p_f1_b_g"]);
        assert_eq!(extra.group_inputs("p_f1_b_g").unwrap(), ["p_f1_b_g_y"]);
        assert!(extra.branch_inputs("p_f1_a").is_none());
        assert_eq!(extra.total_inputs, 5);
    }

    #[test]
    fn test_branch_lookup() {
        let extra = sample();
        assert!(extra.is_branch_of("p_f1", "p_f1_b"));
        assert!(!extra.is_branch_of("p_f1", "p_f1_a"));
        assert!(!extra.is_branch_of("p_f2", "p_f1_b"));
        assert_eq!(extra.form_branches("p_f1"), vec!["p_f1_b"]);
    }
}
