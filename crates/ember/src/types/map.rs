use indexmap::IndexMap;

use crate::{
    builtins::{NativeDefault, NativeMethod, NativeParam, native},
    bytecode::vm::Vm,
    exception_private::{ExcType, RunError, RunResult},
    heap::{Heap, HeapId},
    types::{BuiltinType, NativeIter},
    value::{ObjectData, Value},
};

/// Hash key derived from a map key value.
///
/// Null, bools, numbers and strings compare by value; every other object
/// compares by identity. Integral nums normalize to the int key so `1` and
/// `1.0` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum MapKey {
    Null,
    Bool(bool),
    Int(i64),
    Num(u64),
    Str(String),
    Identity(HeapId),
}

/// Computes the key identity of a value.
pub(crate) fn map_key(heap: &Heap, value: Value) -> MapKey {
    match heap.data(value) {
        ObjectData::Null => MapKey::Null,
        ObjectData::Bool(b) => MapKey::Bool(*b),
        ObjectData::Int(i) => MapKey::Int(*i),
        ObjectData::Num(n) => {
            if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 {
                MapKey::Int(*n as i64)
            } else {
                MapKey::Num(n.to_bits())
            }
        }
        ObjectData::Str(s) => MapKey::Str(s.clone()),
        _ => MapKey::Identity(value.id()),
    }
}

/// Insertion-ordered map backing the `map` kind.
///
/// Each entry keeps the original key value alongside the stored value so
/// `keys()` returns the objects that were inserted.
#[derive(Debug, Clone, Default)]
pub(crate) struct Map {
    entries: IndexMap<MapKey, (Value, Value), ahash::RandomState>,
}

impl Map {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &MapKey) -> Option<Value> {
        self.entries.get(key).map(|(_, v)| *v)
    }

    pub fn contains(&self, key: &MapKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces; an existing entry keeps its position and original key.
    pub fn insert(&mut self, key: MapKey, key_value: Value, value: Value) {
        match self.entries.get_mut(&key) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.insert(key, (key_value, value));
            }
        }
    }

    pub fn remove(&mut self, key: &MapKey) -> Option<Value> {
        self.entries.shift_remove(key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = Value> + '_ {
        self.entries.values().map(|(k, _)| *k)
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.entries.values().map(|(_, v)| *v)
    }

    /// Key at insertion position `index`.
    pub fn key_at(&self, index: usize) -> Option<Value> {
        self.entries.get_index(index).map(|(_, (k, _))| *k)
    }

    pub fn collect_refs(&self, objects: &mut Vec<Value>) {
        for (k, v) in self.entries.values() {
            objects.push(*k);
            objects.push(*v);
        }
    }
}

const SELF: NativeParam = NativeParam::typed("self", BuiltinType::Map);
const KEY: NativeParam = NativeParam::new("key");

pub(crate) const MAP_METHODS: &[NativeMethod] = &[
    native!("op_get_item", [SELF, KEY], map_get_item),
    native!("op_set_item", [SELF, KEY, NativeParam::new("value")], map_set_item),
    native!("op_del_item", [SELF, KEY], map_del_item),
    native!("get", [SELF, KEY, NativeParam::new("default").default(NativeDefault::Null)], map_get),
    native!("keys", [SELF], map_keys),
    native!("values", [SELF], map_values),
    native!("op_len", [SELF], map_len),
    native!("op_contains", [SELF, KEY], map_contains),
    native!("op_iter", [SELF], map_iter),
    native!("op_bool", [SELF], map_bool),
    native!("op_str", [SELF], map_str),
    native!("create", [NativeParam::typed("cls", BuiltinType::Type)], map_create),
];

fn entries<'h>(vm: &'h Vm<'_>, map: Value) -> RunResult<&'h Map> {
    match vm.heap.data(map) {
        ObjectData::Map(entries) => Ok(entries),
        _ => Err(vm.heap.unexpected("map", map)),
    }
}

fn entries_mut<'h>(vm: &'h mut Vm<'_>, map: Value) -> RunResult<&'h mut Map> {
    if !matches!(vm.heap.data(map), ObjectData::Map(_)) {
        return Err(vm.heap.unexpected("map", map));
    }
    match &mut vm.heap.get_mut(map).data {
        ObjectData::Map(entries) => Ok(entries),
        _ => Err(RunError::internal("map changed kind")),
    }
}

fn missing_key(vm: &mut Vm<'_>, key: Value) -> RunResult<RunError> {
    let shown = vm.repr(key)?;
    Ok(ExcType::KeyError.msg(shown))
}

fn map_get_item(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let key = map_key(vm.heap, args[1]);
    let found = entries(vm, args[0])?.get(&key);
    match found {
        Some(value) => Ok(value),
        None => Err(missing_key(vm, args[1])?),
    }
}

fn map_set_item(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let key = map_key(vm.heap, args[1]);
    entries_mut(vm, args[0])?.insert(key, args[1], args[2]);
    Ok(vm.heap.null())
}

fn map_del_item(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let key = map_key(vm.heap, args[1]);
    let removed = entries_mut(vm, args[0])?.remove(&key);
    match removed {
        Some(_) => Ok(vm.heap.null()),
        None => Err(missing_key(vm, args[1])?),
    }
}

fn map_get(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let key = map_key(vm.heap, args[1]);
    Ok(entries(vm, args[0])?.get(&key).unwrap_or(args[2]))
}

fn map_keys(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let keys: Vec<Value> = entries(vm, args[0])?.keys().collect();
    vm.heap.list(keys)
}

fn map_values(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let values: Vec<Value> = entries(vm, args[0])?.values().collect();
    vm.heap.list(values)
}

fn map_len(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let len = entries(vm, args[0])?.len();
    vm.heap.int(len as i64)
}

fn map_contains(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let key = map_key(vm.heap, args[1]);
    let found = entries(vm, args[0])?.contains(&key);
    Ok(vm.heap.bool_value(found))
}

fn map_iter(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    vm.heap.allocate(ObjectData::Iterator(NativeIter::MapKeys {
        map: args[0],
        index: 0,
    }))
}

fn map_bool(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let truthy = entries(vm, args[0])?.len() > 0;
    Ok(vm.heap.bool_value(truthy))
}

fn map_str(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let pairs: Vec<(Value, Value)> = {
        let map = entries(vm, args[0])?;
        map.keys().zip(map.values()).collect()
    };
    let pinned: Vec<Value> = pairs.iter().flat_map(|&(k, v)| [k, v]).collect();
    let parts = vm.with_pinned(&pinned, |vm| -> RunResult<Vec<String>> {
        let mut parts = Vec::with_capacity(pairs.len());
        for &(key, value) in &pairs {
            let key = vm.repr(key)?;
            let value = if value == args[0] { "{...}".to_owned() } else { vm.repr(value)? };
            parts.push(format!("{key}: {value}"));
        }
        Ok(parts)
    })?;
    vm.heap.string(format!("{{{}}}", parts.join(", ")))
}

fn map_create(vm: &mut Vm<'_>, args: Vec<Value>) -> RunResult<Value> {
    let cls = args[0];
    if cls == vm.heap.builtin(BuiltinType::Map) {
        vm.heap.allocate(ObjectData::Map(Map::default()))
    } else {
        vm.heap.allocate_typed(ObjectData::Map(Map::default()), cls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::NoLimitTracker;

    #[test]
    fn integral_nums_share_int_keys() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let one = heap.int(1).unwrap();
        let one_num = heap.num(1.0).unwrap();
        let half = heap.num(0.5).unwrap();
        assert_eq!(map_key(&heap, one), map_key(&heap, one_num));
        assert_ne!(map_key(&heap, one), map_key(&heap, half));
    }

    #[test]
    fn reinsert_keeps_position_and_original_key() {
        let mut heap = Heap::new(Box::new(NoLimitTracker));
        let (a, b) = (heap.string("a").unwrap(), heap.string("b").unwrap());
        let a_again = heap.string("a").unwrap();
        let (one, two, three) = (heap.int(1).unwrap(), heap.int(2).unwrap(), heap.int(3).unwrap());

        let mut map = Map::default();
        map.insert(map_key(&heap, a), a, one);
        map.insert(map_key(&heap, b), b, two);
        map.insert(map_key(&heap, a_again), a_again, three);
        assert_eq!(map.len(), 2);
        assert_eq!(map.key_at(0), Some(a));
        assert_eq!(map.get(&map_key(&heap, a)), Some(three));
        assert_eq!(map.remove(&map_key(&heap, b)), Some(two));
        assert_eq!(map.key_at(1), None);
    }
}
