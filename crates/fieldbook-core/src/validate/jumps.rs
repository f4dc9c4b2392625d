//! Skip-logic validation for one input list
//!
//! Jumps are local to the list that declares them (form top level, one
//! branch, or one group) and may only move forward over at least one input.

use std::collections::HashMap;

use crate::codes::{CodedError, ErrorCode};
use crate::definition::{Input, InputType, JumpCondition};

/// Ref -> position map for one list
pub struct JumpGraph<'a> {
    positions: HashMap<&'a str, usize>,
}

impl<'a> JumpGraph<'a> {
    pub fn new(inputs: &'a [Input]) -> Self {
        let positions = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| (input.input_ref.as_str(), i))
            .collect();
        Self { positions }
    }

    /// Check the jumps of the input sitting at `position`
    ///
    /// `in_group` is true when the list belongs to a group.
    pub fn check(&self, position: usize, input: &Input, in_group: bool) -> Result<(), CodedError> {
        if input.jumps.is_empty() {
            return Ok(());
        }

        let fail = |code| Err(CodedError::new(&input.input_ref, code));

        if in_group || input.input_type == InputType::Group {
            return fail(ErrorCode::JumpsNotAllowed);
        }

        for jump in &input.jumps {
            if jump.to.trim().is_empty() || jump.when.trim().is_empty() {
                return fail(ErrorCode::JumpMissingFields);
            }

            let Some(condition) = jump.condition() else {
                return fail(ErrorCode::JumpConditionInvalid);
            };

            if condition != JumpCondition::All && !input.input_type.is_choice() {
                return fail(ErrorCode::JumpConditionNotAllowed);
            }

            if condition.needs_answer_ref() {
                let answer_ref = jump.answer_ref.as_deref().unwrap_or("").trim();
                if answer_ref.is_empty() || !input.has_possible_answer(answer_ref) {
                    return fail(ErrorCode::JumpAnswerRefInvalid);
                }
            }

            if jump.is_to_end() {
                continue;
            }

            match self.positions.get(jump.to.as_str()) {
                None => return fail(ErrorCode::JumpTargetInvalid),
                // Jumping to the next input would skip nothing
                Some(&target) if target < position + 2 => {
                    return fail(ErrorCode::JumpPositionInvalid)
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
