use crate::{
    builtins::{NativeMethod, NativeParam, native},
    bytecode::vm::{Frame, Vm},
    exception_private::RunResult,
    types::{BuiltinType, iter::iterator_iter},
    value::Value,
};

/// Lifecycle of a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub(crate) enum GeneratorState {
    /// Created by calling a generator function, body not entered yet.
    New,
    /// Currently executing; re-entrant `next` calls fail.
    Running,
    /// Stopped at a yield, frame preserved.
    Suspended,
    /// Body completed or raised; every further `next` raises `IteratorStopped`.
    Finished,
}

/// A suspended generator function activation.
///
/// The frame is the whole suspended state: instruction pointer, operand stack,
/// current scope and any suspended try-block sub-frames. It is taken out of the
/// generator while running and put back on suspension.
#[derive(Debug)]
pub(crate) struct Generator {
    pub frame: Option<Box<Frame>>,
    pub state: GeneratorState,
    pub name: String,
}

const SELF: NativeParam = NativeParam::typed("self", BuiltinType::Generator);

pub(crate) const GENERATOR_METHODS: &[NativeMethod] = &[
    native!("next", [SELF], generator_next),
    native!("op_iter", [SELF], iterator_iter),
];

fn generator_next(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    vm.generator_next(args[0])
}
