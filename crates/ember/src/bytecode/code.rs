use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::op::{Instruction, Opcode};

/// An immutable instruction sequence, or a slice of one.
///
/// Slices share the underlying instructions, so cutting a function body or a
/// try block out of its enclosing code is cheap. Tags are resolved by linear
/// scan within the slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Instruction>", into = "Vec<Instruction>")]
pub struct Code {
    instructions: Rc<[Instruction]>,
    start: usize,
    end: usize,
}

impl Code {
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let end = instructions.len();
        Self {
            instructions: instructions.into(),
            start: 0,
            end,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The instructions of this slice.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions[self.start..self.end]
    }

    /// Index of the first instruction carrying `tag`.
    #[must_use]
    pub fn find_tag(&self, tag: &str) -> Option<usize> {
        self.find_tag_from(0, tag)
    }

    /// Index of the first instruction at or after `from` carrying `tag`.
    #[must_use]
    pub fn find_tag_from(&self, from: usize, tag: &str) -> Option<usize> {
        self.instructions()
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, instr)| instr.tag.as_deref() == Some(tag))
            .map(|(i, _)| i)
    }

    /// Sub-slice `[from, to)` of this slice.
    #[must_use]
    pub fn slice(&self, from: usize, to: usize) -> Self {
        debug_assert!(from <= to && to <= self.len());
        Self {
            instructions: Rc::clone(&self.instructions),
            start: self.start + from,
            end: self.start + to,
        }
    }

    /// Locates a bracketed body by the tag of its `BodyStart`.
    ///
    /// Returns the index of the `BodyStart`, the index of its closing
    /// instruction, and the body in between. The search starts at `from`.
    #[must_use]
    pub fn body_from(&self, from: usize, tag: &str) -> Option<(usize, usize, Self)> {
        let start = self.find_tag_from(from, tag)?;
        let Opcode::BodyStart { end } = &self.instructions()[start].op else {
            return None;
        };
        let end = self.find_tag_from(start + 1, end)?;
        Some((start, end, self.slice(start + 1, end)))
    }
}

impl From<Vec<Instruction>> for Code {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

impl From<Code> for Vec<Instruction> {
    fn from(code: Code) -> Self {
        code.instructions().to_vec()
    }
}
