use crate::{
    bytecode::vm::Vm,
    exception_private::{ExcType, RunResult},
    types::BaseView,
    value::{ObjectData, Value},
};

/// `base(T, obj)`: a view of `obj` that resolves members from the Types after
/// `T` in the MRO of `obj`'s Type.
pub(super) fn builtin_base(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let (after, instance) = (args[0], args[1]);
    // Views of views delegate to the underlying instance.
    let instance = match vm.heap.data(instance) {
        ObjectData::BaseView(view) => view.instance,
        _ => instance,
    };
    if !vm.heap.is_instance(instance, after) {
        return Err(ExcType::TypeError.msg(format!(
            "base({}, obj): obj must be an instance of {}, not '{}'",
            vm.heap.type_name_of_type(after),
            vm.heap.type_name_of_type(after),
            vm.heap.type_name(instance)
        )));
    }
    vm.heap.allocate(ObjectData::BaseView(BaseView { instance, after }))
}
