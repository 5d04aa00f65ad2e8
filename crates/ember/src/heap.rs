//! Arena storage for runtime objects and scopes.
//!
//! Objects and scopes live in slot vectors addressed by [`HeapId`] and [`ScopeId`].
//! Freed slots are recycled through free lists. Memory is reclaimed by a
//! mark-sweep pass ([`Heap::collect_garbage`]) over explicit roots, so reference
//! cycles between instances, types and closures are collected.

use std::collections::BTreeMap;

use crate::{
    exception_private::{ExcType, RunError, RunResult},
    resource::ResourceTracker,
    scope::Scope,
    types::{BuiltinType, TypeData},
    value::{HeapObject, ObjectData, Value},
};

/// Unique identifier for an object slot on the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Unique identifier for a scope slot on the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

// The three singletons occupy the first slots and are never freed.
const NULL_ID: HeapId = HeapId(0);
const TRUE_ID: HeapId = HeapId(1);
const FALSE_ID: HeapId = HeapId(2);

/// Snapshot of heap usage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HeapStats {
    /// Total number of live objects on the heap.
    pub live_objects: usize,
    /// Number of free (recycled) object slots available for reuse.
    pub free_slots: usize,
    /// Total object capacity (live + free).
    pub total_slots: usize,
    /// Number of live scopes.
    pub live_scopes: usize,
    /// Breakdown of live objects by data kind ("Int", "List", "Type", ...).
    pub objects_by_kind: BTreeMap<&'static str, usize>,
    /// Resource tracker allocation count, if the tracker records one.
    pub tracker_allocations: Option<usize>,
}

/// Arena holding every object and scope of one runtime.
#[derive(Debug)]
pub(crate) struct Heap {
    objects: Vec<Option<HeapObject>>,
    scopes: Vec<Option<Scope>>,
    free_objects: Vec<HeapId>,
    free_scopes: Vec<ScopeId>,
    tracker: Box<dyn ResourceTracker>,
    allocations_since_gc: usize,
    /// Builtin Types indexed by `BuiltinType as usize`, filled during bootstrap.
    builtin_types: Vec<Value>,
    /// Materialized error Types indexed by `ExcType as usize`.
    exc_types: Vec<Value>,
}

impl Heap {
    pub fn new(tracker: Box<dyn ResourceTracker>) -> Self {
        let objects = vec![
            Some(HeapObject::new(ObjectData::Null, None)),
            Some(HeapObject::new(ObjectData::Bool(true), None)),
            Some(HeapObject::new(ObjectData::Bool(false), None)),
        ];
        Self {
            objects,
            scopes: Vec::new(),
            free_objects: Vec::new(),
            free_scopes: Vec::new(),
            tracker,
            allocations_since_gc: 0,
            builtin_types: Vec::new(),
            exc_types: Vec::new(),
        }
    }

    pub fn tracker(&self) -> &dyn ResourceTracker {
        &*self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut dyn ResourceTracker {
        &mut *self.tracker
    }

    /// Whether enough allocations have happened since the last collection.
    pub fn should_gc(&self) -> bool {
        self.tracker.should_gc(self.allocations_since_gc)
    }

    /// Swaps in a new tracker, returning the previous one.
    pub fn replace_tracker(&mut self, tracker: Box<dyn ResourceTracker>) -> Box<dyn ResourceTracker> {
        self.allocations_since_gc = 0;
        std::mem::replace(&mut self.tracker, tracker)
    }

    /// Allocates an object whose Type is the static Type of its data kind.
    pub fn allocate(&mut self, data: ObjectData) -> RunResult<Value> {
        self.allocate_object(HeapObject::new(data, None))
    }

    /// Allocates an object with an explicit Type.
    pub fn allocate_typed(&mut self, data: ObjectData, type_id: Value) -> RunResult<Value> {
        self.allocate_object(HeapObject::new(data, Some(type_id)))
    }

    fn allocate_object(&mut self, object: HeapObject) -> RunResult<Value> {
        self.tracker.on_allocate()?;
        self.allocations_since_gc += 1;
        let id = if let Some(id) = self.free_objects.pop() {
            self.objects[id.0] = Some(object);
            id
        } else {
            self.objects.push(Some(object));
            HeapId(self.objects.len() - 1)
        };
        Ok(Value(id))
    }

    /// Allocates a new scope nested in `outer`.
    pub fn allocate_scope(&mut self, outer: Option<ScopeId>) -> RunResult<ScopeId> {
        self.tracker.on_allocate()?;
        self.allocations_since_gc += 1;
        let scope = Scope::new(outer);
        let id = if let Some(id) = self.free_scopes.pop() {
            self.scopes[id.0] = Some(scope);
            id
        } else {
            self.scopes.push(Some(scope));
            ScopeId(self.scopes.len() - 1)
        };
        Ok(id)
    }

    /// Returns the object behind a handle.
    ///
    /// # Panics
    /// Panics if the object was freed, which means a root was not reported to
    /// the garbage collector.
    #[inline]
    pub fn get(&self, value: Value) -> &HeapObject {
        self.objects[value.0.0].as_ref().expect("Heap::get: object already freed")
    }

    #[inline]
    pub fn get_mut(&mut self, value: Value) -> &mut HeapObject {
        self.objects[value.0.0]
            .as_mut()
            .expect("Heap::get_mut: object already freed")
    }

    #[inline]
    pub fn data(&self, value: Value) -> &ObjectData {
        &self.get(value).data
    }

    #[inline]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        self.scopes[id.0].as_ref().expect("Heap::scope: scope already freed")
    }

    #[inline]
    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        self.scopes[id.0].as_mut().expect("Heap::scope_mut: scope already freed")
    }

    // ========================================================================
    // Singletons and primitive constructors
    // ========================================================================

    #[inline]
    pub fn null(&self) -> Value {
        Value(NULL_ID)
    }

    #[inline]
    pub fn bool_value(&self, b: bool) -> Value {
        Value(if b { TRUE_ID } else { FALSE_ID })
    }

    #[inline]
    pub fn is_null(&self, value: Value) -> bool {
        value.0 == NULL_ID
    }

    pub fn int(&mut self, i: i64) -> RunResult<Value> {
        self.allocate(ObjectData::Int(i))
    }

    pub fn num(&mut self, n: f64) -> RunResult<Value> {
        self.allocate(ObjectData::Num(n))
    }

    pub fn string(&mut self, s: impl Into<String>) -> RunResult<Value> {
        self.allocate(ObjectData::Str(s.into()))
    }

    pub fn list(&mut self, items: Vec<Value>) -> RunResult<Value> {
        self.allocate(ObjectData::List(items))
    }

    // ========================================================================
    // Typed views
    // ========================================================================

    pub fn as_int(&self, value: Value) -> Option<i64> {
        match self.data(value) {
            ObjectData::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of an int or num.
    pub fn as_num(&self, value: Value) -> Option<f64> {
        match self.data(value) {
            ObjectData::Int(i) => Some(*i as f64),
            ObjectData::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self, value: Value) -> Option<&str> {
        match self.data(value) {
            ObjectData::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self, value: Value) -> Option<bool> {
        match self.data(value) {
            ObjectData::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_type(&self, value: Value) -> Option<&TypeData> {
        match self.data(value) {
            ObjectData::Type(ty) => Some(ty),
            _ => None,
        }
    }

    // ========================================================================
    // Types
    // ========================================================================

    pub(crate) fn set_builtin_types(&mut self, builtin_types: Vec<Value>, exc_types: Vec<Value>) {
        self.builtin_types = builtin_types;
        self.exc_types = exc_types;
    }

    #[inline]
    pub fn builtin(&self, kind: BuiltinType) -> Value {
        self.builtin_types[kind as usize]
    }

    #[inline]
    pub fn exc_type(&self, kind: ExcType) -> Value {
        self.exc_types[kind as usize]
    }

    /// Returns the Type of any value: its explicit Type, or the static Type of its kind.
    pub fn type_of(&self, value: Value) -> Value {
        let object = self.get(value);
        if let Some(ty) = object.type_id {
            return ty;
        }
        let kind = match &object.data {
            ObjectData::Plain => BuiltinType::Object,
            ObjectData::Null => BuiltinType::Null,
            ObjectData::Bool(_) => BuiltinType::Bool,
            ObjectData::Int(_) => BuiltinType::Int,
            ObjectData::Num(_) => BuiltinType::Num,
            ObjectData::Str(_) => BuiltinType::String,
            ObjectData::List(_) => BuiltinType::List,
            ObjectData::Map(_) => BuiltinType::Map,
            ObjectData::Range(_) => BuiltinType::Range,
            ObjectData::Type(_) => BuiltinType::Type,
            ObjectData::Function(_) => BuiltinType::Function,
            ObjectData::BaseView(_) => BuiltinType::BaseView,
            ObjectData::Iterator(_) => BuiltinType::Iterator,
            ObjectData::Generator(_) => BuiltinType::Generator,
            ObjectData::Error(_) => return self.exc_type(ExcType::Error),
        };
        self.builtin(kind)
    }

    /// Name of a Type value, or `"?"` for non-types.
    pub fn type_name_of_type(&self, ty: Value) -> &str {
        self.as_type(ty).map_or("?", |data| data.name.as_str())
    }

    /// Name of the Type of any value.
    pub fn type_name(&self, value: Value) -> &str {
        self.type_name_of_type(self.type_of(value))
    }

    /// Linearization of a Type, or an empty slice for non-types.
    pub fn mro(&self, ty: Value) -> &[Value] {
        self.as_type(ty).map_or(&[][..], |data| data.mro.as_slice())
    }

    /// Whether `sub` is `sup` or inherits from it.
    pub fn is_subtype(&self, sub: Value, sup: Value) -> bool {
        sub == sup || self.mro(sub).contains(&sup)
    }

    /// Whether the value's Type is assignable to `ty`.
    pub fn is_instance(&self, value: Value, ty: Value) -> bool {
        self.is_subtype(self.type_of(value), ty)
    }

    /// Builds an internal error describing a handle of the wrong kind.
    pub fn unexpected(&self, what: &'static str, value: Value) -> RunError {
        let kind: &'static str = self.data(value).into();
        RunError::internal(format!("expected {what}, found {kind}"))
    }

    // ========================================================================
    // Garbage collection
    // ========================================================================

    /// Frees every object and scope not reachable from the given roots.
    ///
    /// Singletons and builtin Types are always roots. Returns the number of
    /// objects freed.
    pub fn collect_garbage(&mut self, roots: Vec<Value>, scope_roots: Vec<ScopeId>) -> usize {
        let mut reachable = vec![false; self.objects.len()];
        let mut reachable_scopes = vec![false; self.scopes.len()];
        let mut work_list = roots;
        let mut scope_work = scope_roots;
        work_list.extend([Value(NULL_ID), Value(TRUE_ID), Value(FALSE_ID)]);
        work_list.extend(self.builtin_types.iter().copied());
        work_list.extend(self.exc_types.iter().copied());

        while !work_list.is_empty() || !scope_work.is_empty() {
            while let Some(value) = work_list.pop() {
                let idx = value.0.0;
                if idx >= reachable.len() || reachable[idx] {
                    continue;
                }
                reachable[idx] = true;
                if let Some(object) = &self.objects[idx] {
                    work_list.extend(object.type_id);
                    work_list.extend(object.members.values().copied());
                    object.data.collect_refs(&mut work_list, &mut scope_work);
                }
            }
            while let Some(id) = scope_work.pop() {
                let idx = id.0;
                if idx >= reachable_scopes.len() || reachable_scopes[idx] {
                    continue;
                }
                reachable_scopes[idx] = true;
                if let Some(scope) = &self.scopes[idx] {
                    work_list.extend(scope.vars.values().copied());
                    scope_work.extend(scope.outer);
                }
            }
        }

        let mut freed = 0;
        for (idx, slot) in self.objects.iter_mut().enumerate() {
            if !reachable[idx] && slot.take().is_some() {
                self.free_objects.push(HeapId(idx));
                freed += 1;
            }
        }
        let mut freed_scopes = 0;
        for (idx, slot) in self.scopes.iter_mut().enumerate() {
            if !reachable_scopes[idx] && slot.take().is_some() {
                self.free_scopes.push(ScopeId(idx));
                freed_scopes += 1;
            }
        }
        self.tracker.on_free(freed + freed_scopes);
        self.allocations_since_gc = 0;
        freed
    }

    pub fn stats(&self) -> HeapStats {
        let mut objects_by_kind = BTreeMap::new();
        let mut live_objects = 0;
        for object in self.objects.iter().flatten() {
            live_objects += 1;
            let kind: &'static str = (&object.data).into();
            *objects_by_kind.entry(kind).or_insert(0) += 1;
        }
        HeapStats {
            live_objects,
            free_slots: self.free_objects.len(),
            total_slots: self.objects.len(),
            live_scopes: self.scopes.iter().flatten().count(),
            objects_by_kind,
            tracker_allocations: self.tracker.allocation_count(),
        }
    }
}
