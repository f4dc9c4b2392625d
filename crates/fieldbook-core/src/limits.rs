//! Structural limits for project definitions and answers

use serde::{Deserialize, Serialize};

/// Maximum forms per project (5)
pub const MAX_FORMS: usize = 5;

/// Maximum inputs per project, counted through branches and groups (300)
pub const MAX_INPUTS: usize = 300;

/// Maximum title inputs per owner (form or branch) (3)
pub const MAX_TITLES: usize = 3;

/// Maximum search inputs per project (5)
pub const MAX_SEARCH_INPUTS: usize = 5;

/// Maximum possible answers for radio, dropdown and checkbox (300)
pub const MAX_POSSIBLE_ANSWERS: usize = 300;

/// Maximum possible answers for search inputs (1000)
pub const MAX_SEARCH_POSSIBLE_ANSWERS: usize = 1000;

/// Exact length of a possible answer ref (13 chars)
pub const ANSWER_REF_LEN: usize = 13;

/// Maximum form name length (50 chars)
pub const MAX_FORM_NAME_LEN: usize = 50;

/// Maximum question length (255 chars)
pub const MAX_QUESTION_LEN: usize = 255;

/// Maximum readme length (1000 chars)
pub const MAX_README_LEN: usize = 1000;

/// Maximum possible answer text length (150 chars)
pub const MAX_POSSIBLE_ANSWER_LEN: usize = 150;

/// Maximum text answer length (255 chars)
pub const MAX_TEXT_ANSWER_LEN: usize = 255;

/// Maximum textarea answer length (1000 chars)
pub const MAX_TEXTAREA_ANSWER_LEN: usize = 1000;

/// Maximum phone answer length (255 chars)
pub const MAX_PHONE_ANSWER_LEN: usize = 255;

/// Configurable limits applied by the definition validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectLimits {
    pub forms: usize,
    pub inputs: usize,
    pub titles: usize,
    pub search_inputs: usize,
    pub possible_answers: usize,
    pub search_possible_answers: usize,
}

impl Default for ProjectLimits {
    fn default() -> Self {
        Self {
            forms: MAX_FORMS,
            inputs: MAX_INPUTS,
            titles: MAX_TITLES,
            search_inputs: MAX_SEARCH_INPUTS,
            possible_answers: MAX_POSSIBLE_ANSWERS,
            search_possible_answers: MAX_SEARCH_POSSIBLE_ANSWERS,
        }
    }
}

impl ProjectLimits {
    pub fn with_inputs(mut self, inputs: usize) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_forms(mut self, forms: usize) -> Self {
        self.forms = forms;
        self
    }

    pub fn with_titles(mut self, titles: usize) -> Self {
        self.titles = titles;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ProjectLimits::default();
        assert_eq!(limits.forms, MAX_FORMS);
        assert_eq!(limits.inputs, MAX_INPUTS);
        assert_eq!(limits.titles, MAX_TITLES);
    }

    #[test]
    fn test_partial_limits_from_toml_style_json() {
        let limits: ProjectLimits = serde_json::from_str(r#"{"inputs": 10}"#).unwrap();
        assert_eq!(limits.inputs, 10);
        assert_eq!(limits.forms, MAX_FORMS);
    }
}
