//! Project definition types: forms, inputs, possible answers and jumps

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Jump target meaning "skip to the end of the list"
pub const JUMP_END: &str = "END";

/// The closed set of input types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Textarea,
    Integer,
    Decimal,
    Date,
    Time,
    Location,
    Radio,
    Dropdown,
    Checkbox,
    SearchSingle,
    SearchMultiple,
    Photo,
    Video,
    Audio,
    Phone,
    Branch,
    Group,
    Readme,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::Time => "time",
            Self::Location => "location",
            Self::Radio => "radio",
            Self::Dropdown => "dropdown",
            Self::Checkbox => "checkbox",
            Self::SearchSingle => "searchsingle",
            Self::SearchMultiple => "searchmultiple",
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Phone => "phone",
            Self::Branch => "branch",
            Self::Group => "group",
            Self::Readme => "readme",
        }
    }

    /// Types whose answers are drawn from `possible_answers`
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            Self::Radio | Self::Dropdown | Self::Checkbox | Self::SearchSingle | Self::SearchMultiple
        )
    }

    pub fn is_search(&self) -> bool {
        matches!(self, Self::SearchSingle | Self::SearchMultiple)
    }

    pub fn is_media(&self) -> bool {
        matches!(self, Self::Photo | Self::Video | Self::Audio)
    }

    pub fn is_datetime(&self) -> bool {
        matches!(self, Self::Date | Self::Time)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Branch | Self::Group)
    }

    /// Whether an entry must carry an answer object for this input
    pub fn takes_answer(&self) -> bool {
        !matches!(self, Self::Branch | Self::Group | Self::Readme)
    }

    pub fn can_be_title(&self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Integer
                | Self::Decimal
                | Self::Date
                | Self::Time
                | Self::Radio
                | Self::Dropdown
                | Self::Checkbox
                | Self::SearchSingle
                | Self::SearchMultiple
                | Self::Phone
        )
    }

    pub fn can_be_unique(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Integer | Self::Decimal | Self::Date | Self::Time | Self::Phone
        )
    }
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Uniqueness scope of an input's answers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Uniqueness {
    #[default]
    None,
    /// Unique among entries of the same form (or branch)
    Form,
    /// Unique among sibling entries sharing the same parent entry
    Hierarchy,
}

/// One selectable answer of a choice input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleAnswer {
    pub answer_ref: String,
    pub answer: String,
}

impl PossibleAnswer {
    pub fn new(answer_ref: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            answer_ref: answer_ref.into(),
            answer: answer.into(),
        }
    }
}

/// Parsed `when` of a jump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpCondition {
    All,
    NoAnswerGiven,
    Is,
    IsNot,
}

impl JumpCondition {
    pub fn parse(when: &str) -> Option<Self> {
        match when {
            "ALL" => Some(Self::All),
            "NO_ANSWER_GIVEN" => Some(Self::NoAnswerGiven),
            "IS" => Some(Self::Is),
            "IS_NOT" => Some(Self::IsNot),
            _ => None,
        }
    }

    /// Conditions that compare against one of the input's possible answers
    pub fn needs_answer_ref(&self) -> bool {
        matches!(self, Self::Is | Self::IsNot)
    }
}

/// A skip-logic edge declared on an input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jump {
    #[serde(default)]
    pub when: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_ref: Option<String>,
    #[serde(default)]
    pub to: String,
}

impl Jump {
    pub fn new(when: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            when: when.into(),
            answer_ref: None,
            to: to.into(),
        }
    }

    pub fn with_answer_ref(mut self, answer_ref: impl Into<String>) -> Self {
        self.answer_ref = Some(answer_ref.into());
        self
    }

    pub fn condition(&self) -> Option<JumpCondition> {
        JumpCondition::parse(&self.when)
    }

    pub fn is_to_end(&self) -> bool {
        self.to == JUMP_END
    }
}

/// A question (or container) within a form, branch or group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(rename = "ref")]
    pub input_ref: String,

    #[serde(rename = "type")]
    pub input_type: InputType,

    #[serde(default)]
    pub question: String,

    #[serde(default)]
    pub is_title: bool,

    #[serde(default)]
    pub is_required: bool,

    #[serde(default)]
    pub uniqueness: Uniqueness,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_answers: Vec<PossibleAnswer>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jumps: Vec<Jump>,

    /// Display format for date and time inputs, e.g. `dd/MM/YYYY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Nested inputs of a `branch`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branch: Vec<Input>,

    /// Nested inputs of a `group`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<Input>,
}

impl Input {
    pub fn new(input_ref: impl Into<String>, input_type: InputType, question: impl Into<String>) -> Self {
        Self {
            input_ref: input_ref.into(),
            input_type,
            question: question.into(),
            is_title: false,
            is_required: false,
            uniqueness: Uniqueness::None,
            possible_answers: Vec::new(),
            jumps: Vec::new(),
            datetime_format: None,
            min: None,
            max: None,
            default: None,
            branch: Vec::new(),
            group: Vec::new(),
        }
    }

    pub fn title(mut self) -> Self {
        self.is_title = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn unique(mut self, uniqueness: Uniqueness) -> Self {
        self.uniqueness = uniqueness;
        self
    }

    pub fn with_answer(mut self, answer_ref: impl Into<String>, answer: impl Into<String>) -> Self {
        self.possible_answers.push(PossibleAnswer::new(answer_ref, answer));
        self
    }

    pub fn with_jump(mut self, jump: Jump) -> Self {
        self.jumps.push(jump);
        self
    }

    pub fn with_datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = Some(format.into());
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_branch(mut self, inputs: Vec<Input>) -> Self {
        self.branch = inputs;
        self
    }

    pub fn with_group(mut self, inputs: Vec<Input>) -> Self {
        self.group = inputs;
        self
    }

    /// Nested inputs for containers, empty for everything else
    pub fn children(&self) -> &[Input] {
        match self.input_type {
            InputType::Branch => &self.branch,
            InputType::Group => &self.group,
            _ => &[],
        }
    }

    pub fn has_possible_answer(&self, answer_ref: &str) -> bool {
        self.possible_answers.iter().any(|a| a.answer_ref == answer_ref)
    }

    /// A copy without nested inputs, as stored in the extra index
    pub fn without_children(&self) -> Self {
        Self {
            branch: Vec::new(),
            group: Vec::new(),
            ..self.clone()
        }
    }
}

/// A form: one level of the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    #[serde(rename = "ref")]
    pub form_ref: String,

    #[serde(default)]
    pub name: String,

    /// Ref of the parent form; only the immediately preceding form qualifies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default)]
    pub inputs: Vec<Input>,
}

impl Form {
    pub fn new(form_ref: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            form_ref: form_ref.into(),
            name: name.into(),
            parent: None,
            inputs: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self
    }
}

/// The full authored structure of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDefinition {
    #[serde(rename = "ref")]
    pub project_ref: String,

    #[serde(default)]
    pub forms: Vec<Form>,

    /// Quotas keyed by form ref or branch input ref
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub entries_limits: HashMap<String, u32>,
}

impl ProjectDefinition {
    pub fn new(project_ref: impl Into<String>) -> Self {
        Self {
            project_ref: project_ref.into(),
            forms: Vec::new(),
            entries_limits: HashMap::new(),
        }
    }

    pub fn with_form(mut self, form: Form) -> Self {
        self.forms.push(form);
        self
    }

    pub fn with_entries_limit(mut self, owner_ref: impl Into<String>, limit: u32) -> Self {
        self.entries_limits.insert(owner_ref.into(), limit);
        self
    }

    /// Parse an authored definition document
    pub fn from_json(content: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_type_wire_names() {
        let t: InputType = serde_json::from_str("\"searchsingle\"").unwrap();
        assert_eq!(t, InputType::SearchSingle);
        assert_eq!(serde_json::to_string(&InputType::Textarea).unwrap(), "\"textarea\"");
    }

    #[test]
    fn test_definition_from_json() {
        let json = r#"{
            "ref": "p1",
            "forms": [{
                "ref": "p1_f1",
                "name": "Household",
                "inputs": [
                    {"ref": "p1_f1_name", "type": "text", "question": "Name", "is_title": true},
                    {"ref": "p1_f1_kids", "type": "branch", "question": "Kids",
                     "branch": [{"ref": "p1_f1_kids_age", "type": "integer", "question": "Age"}]}
                ]
            }]
        }"#;

        let def = ProjectDefinition::from_json(json).unwrap();
        let form = &def.forms[0];
        assert_eq!(form.inputs.len(), 2);
        assert!(form.inputs[0].is_title);
        assert_eq!(form.inputs[0].uniqueness, Uniqueness::None);
        assert_eq!(form.inputs[1].children().len(), 1);
    }

    #[test]
    fn test_definition_from_malformed_json() {
        let err = ProjectDefinition::from_json("{\"ref\": 3}").unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }

    #[test]
    fn test_jump_condition_parse() {
        assert_eq!(Jump::new("ALL", JUMP_END).condition(), Some(JumpCondition::All));
        assert_eq!(Jump::new("IS", "x").condition(), Some(JumpCondition::Is));
        assert!(Jump::new("SOMETIMES", "x").condition().is_none());
        assert!(JumpCondition::IsNot.needs_answer_ref());
        assert!(!JumpCondition::NoAnswerGiven.needs_answer_ref());
    }

    #[test]
    fn test_type_capabilities() {
        assert!(InputType::Checkbox.is_choice());
        assert!(!InputType::Text.is_choice());
        assert!(!InputType::Readme.takes_answer());
        assert!(!InputType::Photo.can_be_title());
        assert!(InputType::Date.can_be_unique());
    }
}
