use std::borrow::Cow;

use crate::{
    bytecode::vm::Vm,
    exception_private::{ExcType, RunError, RunResult},
    exception_public::Exception,
    value::Value,
};

fn writer_failed(err: Exception) -> RunError {
    ExcType::ValueError.msg(format!("print failed: {}", err.message()))
}

/// `print(values...)`: writes the text forms separated by spaces, then a newline.
pub(super) fn builtin_print(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    for (i, value) in args.into_iter().enumerate() {
        if i > 0 {
            vm.print.stdout_push(' ').map_err(writer_failed)?;
        }
        let text = vm.display(value)?;
        vm.print.stdout_write(Cow::Owned(text)).map_err(writer_failed)?;
    }
    vm.print.stdout_push('\n').map_err(writer_failed)?;
    Ok(vm.heap.null())
}
