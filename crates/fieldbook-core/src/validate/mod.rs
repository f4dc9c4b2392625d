//! Recursive project definition validation
//!
//! Walks forms, then each form's inputs depth first (branches and groups
//! share the same code path through an explicit [`Scope`]), and compiles the
//! [`ProjectExtra`] index as inputs are accepted.
//!
//! The first error inside a form aborts that form; later forms are still
//! validated so a single pass can report several independent problems.

pub mod input;
pub mod jumps;

use std::collections::HashSet;

use crate::codes::{CodedError, ErrorCode};
use crate::definition::{Form, Input, InputType, ProjectDefinition};
use crate::extra::{FormExtra, ProjectExtra};
use crate::limits::{ProjectLimits, MAX_FORM_NAME_LEN};

pub use jumps::JumpGraph;

/// Errors collected by one validation pass (at most one per form)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionErrors(pub Vec<CodedError>);

impl DefinitionErrors {
    fn single(source: &str, code: ErrorCode) -> Self {
        Self(vec![CodedError::new(source, code)])
    }

    pub fn errors(&self) -> &[CodedError] {
        &self.0
    }

    pub fn first(&self) -> Option<&CodedError> {
        self.0.first()
    }

    pub fn has(&self, source: &str, code: ErrorCode) -> bool {
        self.0.iter().any(|e| e.source == source && e.code == code)
    }

    pub fn into_vec(self) -> Vec<CodedError> {
        self.0
    }
}

impl std::fmt::Display for DefinitionErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for DefinitionErrors {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Form,
    Branch,
    Group,
}

/// Where in the tree a list of inputs lives
struct Scope<'a> {
    form_ref: &'a str,
    /// Ref that prefixes the list's input refs
    list_owner: &'a str,
    /// Form or branch that title inputs count against
    title_owner: &'a str,
    branch_ref: Option<&'a str>,
    group_ref: Option<&'a str>,
    level: Level,
}

/// State threaded through the whole pass
struct Walk {
    extra: ProjectExtra,
    input_count: usize,
}

/// Validates definitions against a set of [`ProjectLimits`]
#[derive(Debug, Clone, Default)]
pub struct DefinitionValidator {
    limits: ProjectLimits,
}

impl DefinitionValidator {
    pub fn new(limits: ProjectLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ProjectLimits {
        &self.limits
    }

    /// Validate a whole definition and compile its index
    pub fn validate(&self, definition: &ProjectDefinition) -> Result<ProjectExtra, DefinitionErrors> {
        let project_ref = definition.project_ref.as_str();

        if definition.forms.is_empty() {
            return Err(DefinitionErrors::single(project_ref, ErrorCode::NoForms));
        }
        if definition.forms.len() > self.limits.forms {
            return Err(DefinitionErrors::single(project_ref, ErrorCode::TooManyForms));
        }

        let mut walk = Walk {
            extra: ProjectExtra::new(project_ref),
            input_count: 0,
        };
        let mut names = HashSet::new();
        let mut errors = Vec::new();
        let mut previous: Option<&str> = None;

        for (position, form) in definition.forms.iter().enumerate() {
            if let Err(e) = self.validate_form(project_ref, position, form, previous, &mut names, &mut walk) {
                tracing::debug!(form = %form.form_ref, source = %e.source, code = %e.code, "form rejected");
                errors.push(e);
            }
            previous = Some(form.form_ref.as_str());
        }

        if errors.is_empty() {
            for owner_ref in definition.entries_limits.keys() {
                let known = walk.extra.forms.contains_key(owner_ref)
                    || walk
                        .extra
                        .input(owner_ref)
                        .map(|i| i.input_type() == InputType::Branch)
                        .unwrap_or(false);
                if !known {
                    errors.push(CodedError::new(owner_ref, ErrorCode::EntriesLimitInvalid));
                }
            }
        }

        if !errors.is_empty() {
            return Err(DefinitionErrors(errors));
        }

        walk.extra.entries_limits = definition.entries_limits.clone();
        tracing::debug!(
            project = %project_ref,
            forms = walk.extra.form_order.len(),
            inputs = walk.extra.total_inputs,
            "definition compiled"
        );
        Ok(walk.extra)
    }

    fn validate_form(
        &self,
        project_ref: &str,
        position: usize,
        form: &Form,
        previous: Option<&str>,
        names: &mut HashSet<String>,
        walk: &mut Walk,
    ) -> Result<(), CodedError> {
        let form_ref = form.form_ref.as_str();
        let fail = |code| Err(CodedError::new(form_ref, code));

        if !input::is_valid_ref(form_ref, project_ref) {
            return fail(ErrorCode::FormRefInvalid);
        }
        if walk.extra.forms.contains_key(form_ref) {
            return fail(ErrorCode::FormRefDuplicate);
        }

        let name = form.name.trim();
        if name.is_empty() {
            return fail(ErrorCode::FormNameMissing);
        }
        if name.chars().count() > MAX_FORM_NAME_LEN {
            return fail(ErrorCode::FormNameTooLong);
        }
        if !names.insert(name.to_lowercase()) {
            return fail(ErrorCode::FormNameDuplicate);
        }

        // Strict linear hierarchy: form i's parent is form i-1
        if form.parent.as_deref() != previous {
            return fail(ErrorCode::FormParentInvalid);
        }

        walk.extra.add_form(FormExtra {
            form_ref: form_ref.to_string(),
            name: name.to_string(),
            position,
            parent: form.parent.clone(),
            inputs: Vec::new(),
            branches: Default::default(),
            groups: Default::default(),
        });

        let scope = Scope {
            form_ref,
            list_owner: form_ref,
            title_owner: form_ref,
            branch_ref: None,
            group_ref: None,
            level: Level::Form,
        };
        self.walk_list(&scope, &form.inputs, walk)
    }

    fn walk_list(&self, scope: &Scope<'_>, inputs: &[Input], walk: &mut Walk) -> Result<(), CodedError> {
        if inputs.is_empty() {
            let code = match scope.level {
                Level::Form => ErrorCode::NoInputs,
                Level::Branch => ErrorCode::BranchEmpty,
                Level::Group => ErrorCode::GroupEmpty,
            };
            return Err(CodedError::new(scope.list_owner, code));
        }

        walk.input_count += inputs.len();
        if walk.input_count > self.limits.inputs {
            return Err(CodedError::new(scope.list_owner, ErrorCode::TooManyInputs));
        }

        let graph = JumpGraph::new(inputs);
        for (position, item) in inputs.iter().enumerate() {
            self.validate_input(scope, item, walk)?;
            graph.check(position, item, scope.level == Level::Group)?;
            walk.extra
                .add_input(item, scope.form_ref, scope.branch_ref, scope.group_ref);

            match item.input_type {
                InputType::Branch => {
                    let child = Scope {
                        form_ref: scope.form_ref,
                        list_owner: &item.input_ref,
                        title_owner: &item.input_ref,
                        branch_ref: Some(&item.input_ref),
                        group_ref: None,
                        level: Level::Branch,
                    };
                    self.walk_list(&child, &item.branch, walk)?;
                }
                InputType::Group => {
                    let child = Scope {
                        form_ref: scope.form_ref,
                        list_owner: &item.input_ref,
                        // groups count titles against their structural owner
                        title_owner: scope.title_owner,
                        branch_ref: scope.branch_ref,
                        group_ref: Some(&item.input_ref),
                        level: Level::Group,
                    };
                    self.walk_list(&child, &item.group, walk)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn validate_input(&self, scope: &Scope<'_>, item: &Input, walk: &mut Walk) -> Result<(), CodedError> {
        let fail = |code| Err(CodedError::new(&item.input_ref, code));

        if !input::is_valid_ref(&item.input_ref, scope.list_owner) {
            return fail(ErrorCode::InputRefInvalid);
        }
        if walk.extra.has_input(&item.input_ref) {
            return fail(ErrorCode::InputRefDuplicate);
        }

        let placement_ok = match (item.input_type, scope.level) {
            (InputType::Branch, Level::Form) => true,
            (InputType::Branch, _) => false,
            (InputType::Group, Level::Group) => false,
            _ => true,
        };
        if !placement_ok {
            return fail(ErrorCode::InputNotAllowedHere);
        }

        input::check_question(item)?;
        input::check_possible_answers(item, &self.limits)?;
        input::check_datetime_format(item)?;
        input::check_numeric(item)?;
        input::check_uniqueness(item, scope.branch_ref.is_some())?;

        if item.is_title {
            if !item.input_type.can_be_title() {
                return fail(ErrorCode::TitleNotAllowed);
            }
            if walk.extra.add_title(scope.title_owner) > self.limits.titles {
                return fail(ErrorCode::TooManyTitles);
            }
        }

        if item.input_type.is_search() && walk.extra.add_search_input() > self.limits.search_inputs {
            return fail(ErrorCode::TooManySearchInputs);
        }

        Ok(())
    }
}
