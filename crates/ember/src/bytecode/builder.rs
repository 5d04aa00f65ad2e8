//! Builder for emitting bytecode.
//!
//! `CodeBuilder` is the interface external front ends use to produce
//! instruction sequences: it attaches tags, hands out unique labels and emits
//! the bracketed layouts expected by functions, classes, try blocks and loops.

use super::{
    code::Code,
    op::{Instruction, Opcode, ParamSpec},
};

/// Builder for instruction sequences.
///
/// # Usage
///
/// ```
/// use ember::{CodeBuilder, Opcode};
///
/// let mut b = CodeBuilder::new();
/// let done = b.fresh_label("done");
/// b.emit(Opcode::PushBool(false));
/// b.emit(Opcode::JumpIfFalse(done.clone()));
/// b.emit(Opcode::PushInt(1));
/// b.emit(Opcode::Return);
/// b.label(&done);
/// b.emit(Opcode::PushInt(2));
/// b.emit(Opcode::Return);
/// let code = b.build();
/// assert_eq!(code.find_tag(&done), Some(4));
/// ```
#[derive(Debug, Default)]
pub struct CodeBuilder {
    instructions: Vec<Instruction>,
    /// Tag to attach to the next emitted instruction.
    pending_tag: Option<String>,
    next_label: usize,
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits an instruction, attaching a pending label if there is one.
    pub fn emit(&mut self, op: Opcode) -> &mut Self {
        let tag = self.pending_tag.take();
        self.instructions.push(Instruction { op, tag });
        self
    }

    /// Attaches `tag` to the next emitted instruction.
    ///
    /// Two labels in a row are separated by a tagged `Nop`.
    pub fn label(&mut self, tag: &str) -> &mut Self {
        if self.pending_tag.is_some() {
            self.emit(Opcode::Nop);
        }
        self.pending_tag = Some(tag.to_owned());
        self
    }

    /// Returns a label unique within this builder.
    pub fn fresh_label(&mut self, prefix: &str) -> String {
        self.next_label += 1;
        format!("{prefix}#{}", self.next_label)
    }

    pub fn push_int(&mut self, i: i64) -> &mut Self {
        self.emit(Opcode::PushInt(i))
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.emit(Opcode::PushStr(s.to_owned()))
    }

    pub fn get_var(&mut self, name: &str) -> &mut Self {
        self.emit(Opcode::GetVar(name.to_owned()))
    }

    pub fn define_var(&mut self, name: &str) -> &mut Self {
        self.emit(Opcode::DefineVar(name.to_owned()))
    }

    pub fn operator(&mut self, name: &str, argc: usize) -> &mut Self {
        self.emit(Opcode::Operator {
            name: name.to_owned(),
            argc,
        })
    }

    /// Emits a bracketed body under `tag`; the body is skipped when reached.
    pub fn body(&mut self, tag: &str, body: impl FnOnce(&mut Self)) -> &mut Self {
        let end = format!("{tag}.end");
        self.label(tag);
        self.emit(Opcode::BodyStart { end: end.clone() });
        body(self);
        self.label(&end);
        self.emit(Opcode::BodyEnd)
    }

    /// Emits a function definition leaving the function on the stack.
    ///
    /// Default values for the parameters flagged `has_default` must already
    /// have been pushed, in parameter order.
    pub fn function(&mut self, name: &str, params: Vec<ParamSpec>, body: impl FnOnce(&mut Self)) -> &mut Self {
        self.function_impl(name, params, false, body)
    }

    /// Like [`CodeBuilder::function`], for a generator function.
    pub fn generator(&mut self, name: &str, params: Vec<ParamSpec>, body: impl FnOnce(&mut Self)) -> &mut Self {
        self.function_impl(name, params, true, body)
    }

    fn function_impl(
        &mut self,
        name: &str,
        params: Vec<ParamSpec>,
        generator: bool,
        body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        let tag = self.fresh_label(&format!("fn.{name}"));
        self.body(&tag, body);
        self.emit(Opcode::MakeFunction {
            name: name.to_owned(),
            body: tag,
            params,
            generator,
        })
    }

    /// Emits a class definition leaving the Type on the stack.
    ///
    /// `parents` parent Types must already have been pushed, in order.
    pub fn class(&mut self, name: &str, parents: usize, body: impl FnOnce(&mut Self)) -> &mut Self {
        let tag = self.fresh_label(&format!("class.{name}"));
        self.body(&tag, body);
        self.emit(Opcode::MakeClass {
            name: name.to_owned(),
            body: tag,
            parents,
        })
    }

    /// Emits `try { body } catch (binding) { catch }`.
    pub fn try_catch(
        &mut self,
        binding: Option<&str>,
        mut body: impl FnMut(&mut Self),
        mut catch: impl FnMut(&mut Self),
    ) -> &mut Self {
        self.emit_try(binding, &mut body, Some(&mut catch), None)
    }

    /// Emits `try { body } finally { finally }`.
    pub fn try_finally(&mut self, mut body: impl FnMut(&mut Self), mut finally: impl FnMut(&mut Self)) -> &mut Self {
        self.emit_try(None, &mut body, None, Some(&mut finally))
    }

    /// Emits `try { body } catch (binding) { catch } finally { finally }`.
    pub fn try_catch_finally(
        &mut self,
        binding: Option<&str>,
        mut body: impl FnMut(&mut Self),
        mut catch: impl FnMut(&mut Self),
        mut finally: impl FnMut(&mut Self),
    ) -> &mut Self {
        self.emit_try(binding, &mut body, Some(&mut catch), Some(&mut finally))
    }

    fn emit_try(
        &mut self,
        binding: Option<&str>,
        body: &mut dyn FnMut(&mut Self),
        catch: Option<&mut dyn FnMut(&mut Self)>,
        finally: Option<&mut dyn FnMut(&mut Self)>,
    ) -> &mut Self {
        let block = self.fresh_label("try");
        self.emit(Opcode::Try {
            block: block.clone(),
            binding: binding.map(str::to_owned),
        });
        self.body(&format!("{block}.try"), |b| body(b));
        if let Some(catch) = catch {
            self.body(&format!("{block}.catch"), |b| catch(b));
        }
        if let Some(finally) = finally {
            self.body(&format!("{block}.finally"), |b| finally(b));
        }
        self
    }

    /// Emits a loop binding each item of an iterable to `var`.
    ///
    /// `iterable` must push exactly one value.
    pub fn for_each(&mut self, var: &str, iterable: impl FnOnce(&mut Self), body: impl FnOnce(&mut Self)) -> &mut Self {
        let head = self.fresh_label("loop");
        let done = self.fresh_label("loop.done");
        self.get_var("iter");
        iterable(self);
        self.emit(Opcode::Call(1));
        self.label(&head);
        self.emit(Opcode::IterNext(done.clone()));
        self.define_var(var);
        body(self);
        self.emit(Opcode::Jump(head));
        self.label(&done);
        self.emit(Opcode::Nop)
    }

    /// Finishes the sequence; a trailing label lands on a `Nop`.
    #[must_use]
    pub fn build(mut self) -> Code {
        if self.pending_tag.is_some() {
            self.emit(Opcode::Nop);
        }
        Code::new(self.instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_attaches_to_next_instruction() {
        let mut b = CodeBuilder::new();
        b.label("a");
        b.emit(Opcode::PushNull);
        let code = b.build();
        assert_eq!(code.instructions()[0].tag.as_deref(), Some("a"));
    }

    #[test]
    fn consecutive_labels_get_separate_instructions() {
        let mut b = CodeBuilder::new();
        b.label("a").label("b");
        let code = b.build();
        assert_eq!(code.len(), 2);
        assert_eq!(code.find_tag("a"), Some(0));
        assert_eq!(code.find_tag("b"), Some(1));
    }

    #[test]
    fn function_layout() {
        let mut b = CodeBuilder::new();
        b.function("f", vec![ParamSpec::new("x")], |b| {
            b.get_var("x").emit(Opcode::Return);
        });
        let code = b.build();
        let Opcode::MakeFunction { body, .. } = &code.instructions()[4].op else {
            panic!("expected MakeFunction, got {:?}", code.instructions()[4].op);
        };
        let (_, _, slice) = code.body_from(0, body).unwrap();
        assert_eq!(slice.len(), 2);
        assert_eq!(slice.instructions()[0].op, Opcode::GetVar("x".to_owned()));
    }

    #[test]
    fn try_sections_share_block_name() {
        let mut b = CodeBuilder::new();
        b.try_catch_finally(
            Some("e"),
            |b| {
                b.push_int(1);
            },
            |b| {
                b.push_int(2);
            },
            |b| {
                b.push_int(3);
            },
        );
        let code = b.build();
        let Opcode::Try { block, binding } = &code.instructions()[0].op else {
            panic!("expected Try");
        };
        assert_eq!(binding.as_deref(), Some("e"));
        for section in ["try", "catch", "finally"] {
            assert!(code.body_from(0, &format!("{block}.{section}")).is_some(), "{section}");
        }
    }

    #[test]
    fn fresh_labels_are_unique() {
        let mut b = CodeBuilder::new();
        assert_ne!(b.fresh_label("x"), b.fresh_label("x"));
    }
}
