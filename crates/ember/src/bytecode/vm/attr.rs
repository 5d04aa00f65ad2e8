//! The member lookup protocol.
//!
//! Lookup precedence for `obj.name`:
//!
//! 1. the object's own member table, then a per-name getter `hook_get_<name>`
//! 2. for Types, the metatype's members (bound to the Type), failures ignored
//! 3. for Types, the member tables of the rest of the Type's MRO
//! 4. for other objects, the MRO of the object's Type, functions bound to the object
//! 5. the generic `hook_get(name)` hook
//!
//! Views created by `base(T, obj)` replace all of this with a search of the
//! MRO of `obj`'s Type strictly after `T`.

use smallvec::SmallVec;

use super::Vm;
use crate::{
    exception_private::{ExcType, RunResult},
    types::mro_after,
    value::{ObjectData, Value},
};

/// Switches for one member lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LookupMode {
    /// Consult getter hooks.
    pub hooks: bool,
    /// Bind functions found on a Type to the receiver.
    pub bind: bool,
    /// Search the receiver's Type after its own table.
    pub from_type: bool,
}

impl LookupMode {
    pub const FULL: Self = Self {
        hooks: true,
        bind: true,
        from_type: true,
    };
    /// Probes that must neither run user code nor fail on unbindable members.
    pub const NO_HOOKS: Self = Self {
        hooks: false,
        bind: false,
        from_type: true,
    };
}

type Excludes = SmallVec<[Value; 4]>;

/// Hooks are never consulted for hook names themselves.
fn is_hook_name(name: &str) -> bool {
    name.starts_with("hook_")
}

impl Vm<'_> {
    /// Reads a member, failing with `NullError` on null and `AttributeError`
    /// when nothing resolves it.
    pub fn get_member(&mut self, obj: Value, name: &str) -> RunResult<Value> {
        if self.heap.is_null(obj) {
            return Err(ExcType::null_error(name));
        }
        match self.lookup_member(obj, name, LookupMode::FULL)? {
            Some(value) => Ok(value),
            None => Err(ExcType::attribute_error(self.heap.type_name(obj), name)),
        }
    }

    /// Resolves a member without failing when it is absent.
    pub fn lookup_member(&mut self, obj: Value, name: &str, mode: LookupMode) -> RunResult<Option<Value>> {
        let mut excludes = Excludes::new();
        self.lookup_excluding(obj, name, mode, &mut excludes)
    }

    fn lookup_excluding(
        &mut self,
        obj: Value,
        name: &str,
        mode: LookupMode,
        excludes: &mut Excludes,
    ) -> RunResult<Option<Value>> {
        if excludes.contains(&obj) {
            return Ok(None);
        }
        excludes.push(obj);

        if let ObjectData::BaseView(view) = self.heap.data(obj) {
            let view = *view;
            let chain = mro_after(self.heap, self.heap.type_of(view.instance), view.after);
            return match self.lookup_in_chain(&chain, name) {
                Some(found) => self.bind_value(found, view.instance).map(Some),
                None => Ok(None),
            };
        }

        if let Some(value) = self.heap.get(obj).members.get(name).copied() {
            return Ok(Some(value));
        }
        let hooks = mode.hooks && !is_hook_name(name);
        if hooks && let Some(getter) = self.resolve_hook(obj, &format!("hook_get_{name}"))? {
            return self.call_value(getter, Vec::new()).map(Some);
        }

        if self.heap.as_type(obj).is_some() {
            if mode.from_type
                && let Ok(Some(found)) = self.lookup_on_metatype(obj, name, mode, excludes)
            {
                return Ok(Some(found));
            }
            let chain = self.heap.mro(obj).get(1..).unwrap_or_default().to_vec();
            for ty in chain {
                if excludes.contains(&ty) {
                    continue;
                }
                if let Some(value) = self.heap.get(ty).members.get(name).copied() {
                    return Ok(Some(value));
                }
            }
        } else if mode.from_type {
            let ty = self.heap.type_of(obj);
            let chain = self.heap.mro(ty).to_vec();
            if let Some(found) = self.lookup_in_chain(&chain, name) {
                return if mode.bind {
                    self.bind_value(found, obj).map(Some)
                } else {
                    Ok(Some(found))
                };
            }
        }

        if hooks && let Some(hook) = self.resolve_hook(obj, "hook_get")? {
            let key = self.heap.string(name)?;
            return self.call_value(hook, vec![key]).map(Some);
        }
        Ok(None)
    }

    /// Members a Type inherits from its metatype, skipping the Types it
    /// already has in its own MRO.
    fn lookup_on_metatype(
        &mut self,
        ty: Value,
        name: &str,
        mode: LookupMode,
        excludes: &mut Excludes,
    ) -> RunResult<Option<Value>> {
        let own_mro = self.heap.mro(ty).to_vec();
        let meta = self.heap.type_of(ty);
        let chain: Vec<Value> = self
            .heap
            .mro(meta)
            .iter()
            .copied()
            .filter(|t| !own_mro.contains(t) && !excludes.contains(t))
            .collect();
        match self.lookup_in_chain(&chain, name) {
            Some(found) if mode.bind => self.bind_value(found, ty).map(Some),
            found => Ok(found),
        }
    }

    /// First member table along `chain` containing `name`.
    pub fn lookup_in_chain(&self, chain: &[Value], name: &str) -> Option<Value> {
        chain
            .iter()
            .find_map(|&ty| self.heap.get(ty).members.get(name).copied())
    }

    /// Finds a hook for `obj`: an instance's own table first (used unbound),
    /// then its Type's MRO (bound). A Type's own table holds hooks for its
    /// instances, so Types only consult their metatype.
    pub fn resolve_hook(&mut self, obj: Value, hook: &str) -> RunResult<Option<Value>> {
        let is_type = self.heap.as_type(obj).is_some();
        if !is_type && let Some(value) = self.heap.get(obj).members.get(hook).copied() {
            return Ok(Some(value));
        }
        let ty = self.heap.type_of(obj);
        let chain = self.heap.mro(ty).to_vec();
        match self.lookup_in_chain(&chain, hook) {
            Some(found) => self.bind_value(found, obj).map(Some),
            None => Ok(None),
        }
    }

    /// Binds functions to `this`; any other value is returned unchanged.
    pub fn bind_value(&mut self, value: Value, this: Value) -> RunResult<Value> {
        let ObjectData::Function(function) = self.heap.data(value) else {
            return Ok(value);
        };
        let bound = function.bind(this)?;
        self.heap.allocate(ObjectData::Function(Box::new(bound)))
    }

    /// Writes a member: `hook_set_<name>(value)`, then `hook_set(name, value)`,
    /// then the object's own table.
    pub fn set_member(&mut self, obj: Value, name: &str, value: Value) -> RunResult<()> {
        self.check_member_target(obj, name)?;
        if !is_hook_name(name) {
            if let Some(setter) = self.resolve_hook(obj, &format!("hook_set_{name}"))? {
                self.call_value(setter, vec![value])?;
                return Ok(());
            }
            if let Some(hook) = self.resolve_hook(obj, "hook_set")? {
                let key = self.heap.string(name)?;
                self.call_value(hook, vec![key, value])?;
                return Ok(());
            }
        }
        self.heap.get_mut(obj).members.insert(name.to_owned(), value);
        Ok(())
    }

    /// Deletes a member: `hook_del_<name>()`, then `hook_del(name)`, then the
    /// object's own table, failing with `AttributeError` if nothing matched.
    pub fn delete_member(&mut self, obj: Value, name: &str) -> RunResult<()> {
        self.check_member_target(obj, name)?;
        if !is_hook_name(name) {
            if let Some(deleter) = self.resolve_hook(obj, &format!("hook_del_{name}"))? {
                self.call_value(deleter, Vec::new())?;
                return Ok(());
            }
            if let Some(hook) = self.resolve_hook(obj, "hook_del")? {
                let key = self.heap.string(name)?;
                self.call_value(hook, vec![key])?;
                return Ok(());
            }
        }
        match self.heap.get_mut(obj).members.shift_remove(name) {
            Some(_) => Ok(()),
            None => Err(ExcType::attribute_error(self.heap.type_name(obj), name)),
        }
    }

    pub fn check_member_target(&self, obj: Value, name: &str) -> RunResult<()> {
        if self.heap.is_null(obj) {
            return Err(ExcType::null_error(name));
        }
        if matches!(self.heap.data(obj), ObjectData::BaseView(_)) {
            return Err(ExcType::TypeError.msg(format!(
                "cannot modify member '{name}' through a base view"
            )));
        }
        Ok(())
    }
}
