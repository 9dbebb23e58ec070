use crate::value::{Key, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::rc::Rc;

/// One slot in a change record. A plain write records the new value; a
/// write of a composite value is recorded by reference so that further
/// writes through the nested observed view keep landing in the same
/// record.
#[derive(Debug, Clone)]
pub enum ChangeEntry {
    Value(Value),
    Nested(Rc<RefCell<ChangeRecord>>),
    Delete,
}

/// A tree mirroring a component's structure. Consumers read this at the
/// step boundary and are responsible for
/// clearing it afterwards — change records are purely additive within a
/// step.
#[derive(Debug, Clone)]
pub enum ChangeRecord {
    Struct(HashMap<String, ChangeEntry>),
    Array {
        entries: BTreeMap<usize, ChangeEntry>,
        length: Option<usize>,
    },
    Object(HashMap<String, ChangeEntry>),
    Set {
        added: BTreeSet<Key>,
        removed: BTreeSet<Key>,
    },
    Map(HashMap<Key, ChangeEntry>),
}

impl ChangeRecord {
    /// Builds an empty change record matching the shape of `value`.
    pub fn empty_for(value: &Value) -> Self {
        match value {
            Value::Struct(_) => ChangeRecord::Struct(HashMap::new()),
            Value::Array(_) => ChangeRecord::Array {
                entries: BTreeMap::new(),
                length: None,
            },
            Value::Object(_) => ChangeRecord::Object(HashMap::new()),
            Value::Set(_) => ChangeRecord::Set {
                added: BTreeSet::new(),
                removed: BTreeSet::new(),
            },
            Value::Map(_) => ChangeRecord::Map(HashMap::new()),
            Value::Leaf(_) => ChangeRecord::Struct(HashMap::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ChangeRecord::Struct(m) => m.is_empty(),
            ChangeRecord::Array { entries, length } => entries.is_empty() && length.is_none(),
            ChangeRecord::Object(m) => m.is_empty(),
            ChangeRecord::Set { added, removed } => added.is_empty() && removed.is_empty(),
            ChangeRecord::Map(m) => m.is_empty(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            ChangeRecord::Struct(m) => m.clear(),
            ChangeRecord::Array { entries, length } => {
                entries.clear();
                *length = None;
            }
            ChangeRecord::Object(m) => m.clear(),
            ChangeRecord::Set { added, removed } => {
                added.clear();
                removed.clear();
            }
            ChangeRecord::Map(m) => m.clear(),
        }
    }

    pub fn record_struct_field(&mut self, field: &str, entry: ChangeEntry) {
        if let ChangeRecord::Struct(m) = self {
            m.insert(field.to_string(), entry);
        }
    }

    pub fn record_array_index(&mut self, index: usize, entry: ChangeEntry) {
        if let ChangeRecord::Array { entries, .. } = self {
            entries.insert(index, entry);
        }
    }

    pub fn record_array_length(&mut self, len: usize) {
        if let ChangeRecord::Array { length, .. } = self {
            *length = Some(len);
        }
    }

    pub fn record_object_key(&mut self, key: &str, entry: ChangeEntry) {
        if let ChangeRecord::Object(m) = self {
            m.insert(key.to_string(), entry);
        }
    }

    pub fn record_set_add(&mut self, value: Key) {
        if let ChangeRecord::Set { added, removed } = self {
            removed.remove(&value);
            added.insert(value);
        }
    }

    pub fn record_set_remove(&mut self, value: Key) {
        if let ChangeRecord::Set { added, removed } = self {
            added.remove(&value);
            removed.insert(value);
        }
    }

    pub fn record_map_key(&mut self, key: Key, entry: ChangeEntry) {
        if let ChangeRecord::Map(m) = self {
            m.insert(key, entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_overwrite_keeps_latest_value() {
        let mut record = ChangeRecord::Struct(HashMap::new());
        record.record_struct_field("x", ChangeEntry::Value(Value::Leaf(crate::value::Leaf::Int(1))));
        record.record_struct_field("y", ChangeEntry::Value(Value::Leaf(crate::value::Leaf::Int(2))));
        record.record_struct_field("x", ChangeEntry::Value(Value::Leaf(crate::value::Leaf::Int(3))));

        if let ChangeRecord::Struct(m) = &record {
            assert_eq!(m.len(), 2);
        } else {
            panic!("wrong shape");
        }
        assert!(!record.is_empty());
    }

    #[test]
    fn map_delete_then_set_overrides_sentinel() {
        let mut record = ChangeRecord::Map(HashMap::new());
        let k = Key::Str("k".to_string());
        record.record_map_key(k.clone(), ChangeEntry::Value(Value::Leaf(crate::value::Leaf::Int(1))));
        record.record_map_key(k.clone(), ChangeEntry::Delete);
        record.record_map_key(k.clone(), ChangeEntry::Value(Value::Leaf(crate::value::Leaf::Int(2))));

        if let ChangeRecord::Map(m) = &record {
            match m.get(&k) {
                Some(ChangeEntry::Value(Value::Leaf(crate::value::Leaf::Int(n)))) => {
                    assert_eq!(*n, 2)
                }
                other => panic!("expected final value of 2, got {:?}", other),
            }
        }
    }

    #[test]
    fn set_idempotent_duplicates_record_final_state_only() {
        let mut record = ChangeRecord::Set {
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
        };
        record.record_set_add(Key::Int(1));
        record.record_set_add(Key::Int(1));
        record.record_set_remove(Key::Int(1));

        if let ChangeRecord::Set { added, removed } = &record {
            assert!(added.is_empty());
            assert!(removed.contains(&Key::Int(1)));
        }
    }
}
