use smallvec::SmallVec;

use crate::{
    builtins::{NativeMethod, NativeParam, native},
    bytecode::vm::Vm,
    exception_private::{ExcType, RunResult},
    heap::Heap,
    resource::MAX_MRO_LENGTH,
    types::BuiltinType,
    value::{ObjectData, Value},
};

/// Payload of a Type object.
///
/// The MRO is computed once when the Type is created and never changes, since
/// parents are fixed at creation.
#[derive(Debug, Clone)]
pub(crate) struct TypeData {
    pub name: String,
    /// Ordered, de-duplicated direct parents.
    pub parents: SmallVec<[Value; 2]>,
    /// C3 linearization, starting with the Type itself.
    pub mro: Vec<Value>,
    /// Set for the Types the runtime installs itself.
    pub builtin: Option<BuiltinType>,
}

/// View returned by `base(T, obj)`.
///
/// Member lookups through the view search the MRO of `obj`'s Type strictly
/// after `after`, and functions found are bound to `instance`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BaseView {
    pub instance: Value,
    pub after: Value,
}

/// Allocates a Type object and computes its linearization.
///
/// `parents` must already be de-duplicated and non-empty except for the root
/// `object` Type.
pub(crate) fn allocate_type(
    heap: &mut Heap,
    name: &str,
    parents: SmallVec<[Value; 2]>,
    builtin: Option<BuiltinType>,
) -> RunResult<Value> {
    let placeholder = TypeData {
        name: name.to_owned(),
        parents: SmallVec::new(),
        mro: Vec::new(),
        builtin,
    };
    let id = heap.allocate(ObjectData::Type(Box::new(placeholder)))?;
    let mro = compute_c3_mro(id, &parents, heap)?;
    if let ObjectData::Type(ty) = &mut heap.get_mut(id).data {
        ty.parents = parents;
        ty.mro = mro;
    }
    Ok(id)
}

/// Computes the C3 method resolution order for a type.
///
/// Merges the linearizations of all parents plus the ordered parent list
/// itself. At each step the first head that appears in no other list's tail
/// is taken. When no such head exists the hierarchy is inconsistent and an
/// `MroError` is raised.
pub(crate) fn compute_c3_mro(self_id: Value, parents: &[Value], heap: &Heap) -> RunResult<Vec<Value>> {
    if parents.is_empty() {
        return Ok(vec![self_id]);
    }
    if parents.contains(&self_id) {
        return Err(ExcType::MroError.msg("a type cannot inherit from itself"));
    }

    let mut linearizations: Vec<Vec<Value>> = Vec::with_capacity(parents.len() + 1);
    for &parent in parents {
        match heap.as_type(parent) {
            Some(ty) => linearizations.push(ty.mro.clone()),
            None => {
                return Err(ExcType::TypeError.msg(format!(
                    "parents must be types, not '{}'",
                    heap.type_name(parent)
                )));
            }
        }
    }
    linearizations.push(parents.to_vec());

    let mut result = vec![self_id];
    loop {
        linearizations.retain(|l| !l.is_empty());
        if linearizations.is_empty() {
            break;
        }

        let head = linearizations
            .iter()
            .map(|lin| lin[0])
            .find(|candidate| !linearizations.iter().any(|other| other[1..].contains(candidate)));

        let Some(next) = head else {
            let names: Vec<&str> = parents.iter().map(|&p| heap.type_name_of_type(p)).collect();
            return Err(ExcType::MroError.msg(format!(
                "cannot create a consistent method resolution order for parents {}",
                names.join(", ")
            )));
        };
        result.push(next);
        for lin in &mut linearizations {
            if lin.first() == Some(&next) {
                lin.remove(0);
            }
        }

        if result.len() > MAX_MRO_LENGTH {
            return Err(ExcType::MroError.msg("method resolution order exceeds maximum length"));
        }
    }

    Ok(result)
}

/// Returns the part of `ty`'s MRO strictly after `ancestor`.
///
/// An ancestor missing from the MRO yields an empty chain.
pub(crate) fn mro_after(heap: &Heap, ty: Value, ancestor: Value) -> Vec<Value> {
    let mro = heap.mro(ty);
    mro.iter()
        .position(|&t| t == ancestor)
        .map_or_else(Vec::new, |pos| mro[pos + 1..].to_vec())
}

/// Members of `type`, the metatype of every Type.
pub(crate) const TYPE_METHODS: &[NativeMethod] = &[
    native!(
        "op_call",
        [NativeParam::typed("cls", BuiltinType::Type), NativeParam::new("args").rest()],
        type_call
    ),
    native!("op_str", [NativeParam::typed("self", BuiltinType::Type)], type_str),
];

/// Calling a Type instantiates it.
fn type_call(vm: &mut Vm<'_>, mut args: Vec<Value>) -> RunResult<Value> {
    let cls = args.remove(0);
    vm.instantiate(cls, args)
}

fn type_str(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let text = format!("<type {}>", vm.heap.type_name_of_type(args[0]));
    vm.heap.string(text)
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::resource::NoLimitTracker;

    fn names(heap: &Heap, mro: &[Value]) -> Vec<String> {
        mro.iter().map(|&t| heap.type_name_of_type(t).to_owned()).collect()
    }

    #[test]
    fn diamond_linearization() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let o = allocate_type(&mut heap, "O", SmallVec::new(), None).unwrap();
        let a = allocate_type(&mut heap, "A", smallvec![o], None).unwrap();
        let b = allocate_type(&mut heap, "B", smallvec![o], None).unwrap();
        let c = allocate_type(&mut heap, "C", smallvec![a, b], None).unwrap();
        let d = allocate_type(&mut heap, "D", smallvec![b, a], None).unwrap();
        assert_eq!(names(&heap, heap.mro(c)), ["C", "A", "B", "O"]);
        assert_eq!(names(&heap, heap.mro(d)), ["D", "B", "A", "O"]);

        let err = allocate_type(&mut heap, "E", smallvec![c, d], None).unwrap_err();
        assert!(err.is_exception_type(ExcType::MroError));
    }

    #[test]
    fn chain_after_ancestor() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let o = allocate_type(&mut heap, "O", SmallVec::new(), None).unwrap();
        let a = allocate_type(&mut heap, "A", smallvec![o], None).unwrap();
        let b = allocate_type(&mut heap, "B", smallvec![a], None).unwrap();
        assert_eq!(mro_after(&heap, b, b), vec![a, o]);
        assert_eq!(mro_after(&heap, b, a), vec![o]);
        assert!(mro_after(&heap, a, b).is_empty());
    }
}
