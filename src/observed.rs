use crate::change::{ChangeEntry, ChangeRecord};
use crate::value::{Key, Leaf, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PathKey {
    Field(String),
    ObjectKey(String),
    MapKey(Key),
}

/// A transparent proxy over a component value that accumulates a diff as it
/// is written through. A view is a root storage cell plus a path into it —
/// never a detached copy — so a write through any nested view, however deep,
/// lands in the same storage the world reads from. Reads of composite
/// fields return nested views, memoized so that `view.field_view(name) ===
/// view.field_view(name)` across calls within one step.
#[derive(Clone)]
pub struct ObservedView {
    root: Rc<RefCell<Value>>,
    path: Rc<Vec<PathKey>>,
    changes: Rc<RefCell<ChangeRecord>>,
    memo: Rc<RefCell<HashMap<PathKey, ObservedView>>>,
    /// Records this view's change into its parent's record (and recurses
    /// upward) the first time a write actually happens. `None` at the root.
    notify_parent: Option<Rc<dyn Fn()>>,
}

impl ObservedView {
    /// Wraps `value` as the root of a new observed tree, reporting changes
    /// into `changes`.
    pub fn new(value: Rc<RefCell<Value>>, changes: Rc<RefCell<ChangeRecord>>) -> Self {
        ObservedView {
            root: value,
            path: Rc::new(Vec::new()),
            changes,
            memo: Rc::new(RefCell::new(HashMap::new())),
            notify_parent: None,
        }
    }

    pub fn change_record(&self) -> Rc<RefCell<ChangeRecord>> {
        Rc::clone(&self.changes)
    }

    pub fn is_changed(&self) -> bool {
        !self.changes.borrow().is_empty()
    }

    fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        let root = self.root.borrow();
        f(Self::navigate(&root, &self.path))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut root = self.root.borrow_mut();
        f(Self::navigate_mut(&mut root, &self.path))
    }

    fn navigate<'a>(value: &'a Value, path: &[PathKey]) -> &'a Value {
        let mut current = value;
        for key in path {
            current = Self::step(current, key);
        }
        current
    }

    fn navigate_mut<'a>(value: &'a mut Value, path: &[PathKey]) -> &'a mut Value {
        let mut current = value;
        for key in path {
            current = Self::step_mut(current, key);
        }
        current
    }

    fn step<'a>(value: &'a Value, key: &PathKey) -> &'a Value {
        match (value, key) {
            (Value::Struct(m), PathKey::Field(name)) => {
                m.get(name).expect("observed path missing a struct field")
            }
            (Value::Object(m), PathKey::ObjectKey(name)) => {
                m.get(name).expect("observed path missing an object key")
            }
            (Value::Map(m), PathKey::MapKey(key)) => {
                m.get(key).expect("observed path missing a map key")
            }
            _ => panic!("observed path shape mismatch"),
        }
    }

    fn step_mut<'a>(value: &'a mut Value, key: &PathKey) -> &'a mut Value {
        match (value, key) {
            (Value::Struct(m), PathKey::Field(name)) => {
                m.get_mut(name).expect("observed path missing a struct field")
            }
            (Value::Object(m), PathKey::ObjectKey(name)) => {
                m.get_mut(name).expect("observed path missing an object key")
            }
            (Value::Map(m), PathKey::MapKey(key)) => {
                m.get_mut(key).expect("observed path missing a map key")
            }
            _ => panic!("observed path shape mismatch"),
        }
    }

    /// Reports that a write happened at this view: records this view's
    /// change record as `Nested` in the parent (if any) and recurses, so an
    /// edit at any depth surfaces all the way to the root. A pure read never
    /// calls this, so merely obtaining a nested view records nothing.
    fn touch(&self) {
        if let Some(notify) = &self.notify_parent {
            notify();
        }
    }

    /// Builds (or returns the memoized) nested view for `key`. `record` is
    /// called with the parent's change record and this child's record the
    /// first time a write actually reaches this child — not when the view
    /// is merely created by a read.
    fn child(
        &self,
        key: PathKey,
        child_value: &Value,
        record: impl Fn(&mut ChangeRecord, Rc<RefCell<ChangeRecord>>) + 'static,
    ) -> ObservedView {
        if let Some(existing) = self.memo.borrow().get(&key) {
            return existing.clone();
        }
        let mut child_path = (*self.path).clone();
        child_path.push(key.clone());
        let child_changes = Rc::new(RefCell::new(ChangeRecord::empty_for(child_value)));

        let parent_notify = self.notify_parent.clone();
        let parent_changes = Rc::clone(&self.changes);
        let child_changes_for_notify = Rc::clone(&child_changes);
        let notify: Rc<dyn Fn()> = Rc::new(move || {
            record(&mut parent_changes.borrow_mut(), Rc::clone(&child_changes_for_notify));
            if let Some(parent) = &parent_notify {
                parent();
            }
        });

        let view = ObservedView {
            root: Rc::clone(&self.root),
            path: Rc::new(child_path),
            changes: child_changes,
            memo: Rc::new(RefCell::new(HashMap::new())),
            notify_parent: Some(notify),
        };
        self.memo.borrow_mut().insert(key, view.clone());
        view
    }

    // ---- struct / record -------------------------------------------------

    pub fn field(&self, name: &str) -> Value {
        self.read(|v| {
            v.as_struct()
                .and_then(|m| m.get(name))
                .cloned()
                .unwrap_or(Value::Leaf(Leaf::Unit))
        })
    }

    /// Reads a composite field as a memoized nested observed view, sharing
    /// this view's root storage. Does not itself record a change — only a
    /// write through the returned view does.
    pub fn field_view(&self, name: &str) -> ObservedView {
        let child_value = self.write(|v| {
            let m = v.as_struct_mut().expect("field_view() called on non-struct value");
            m.entry(name.to_string())
                .or_insert_with(|| Value::Struct(Default::default()))
                .clone()
        });
        let name_owned = name.to_string();
        self.child(PathKey::Field(name.to_string()), &child_value, move |parent_changes, child_changes| {
            parent_changes.record_struct_field(&name_owned, ChangeEntry::Nested(child_changes));
        })
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.write(|v| {
            let m = v.as_struct_mut().expect("set_field() called on non-struct value");
            m.insert(name.to_string(), value.clone());
        });
        self.changes
            .borrow_mut()
            .record_struct_field(name, ChangeEntry::Value(value));
        self.memo.borrow_mut().remove(&PathKey::Field(name.to_string()));
        self.touch();
    }

    // ---- ordered array -----------------------------------------------------

    pub fn len(&self) -> usize {
        self.read(|v| v.as_array().map(|a| a.len()).unwrap_or(0))
    }

    pub fn get(&self, index: usize) -> Value {
        self.read(|v| {
            v.as_array()
                .and_then(|a| a.get(index))
                .cloned()
                .unwrap_or(Value::Leaf(Leaf::Unit))
        })
    }

    pub fn set(&self, index: usize, value: Value) {
        self.write(|v| {
            let a = v.as_array_mut().expect("set() called on non-array value");
            if index >= a.len() {
                a.resize(index + 1, Value::Leaf(Leaf::Unit));
            }
            a[index] = value.clone();
        });
        let len = self.len();
        let mut changes = self.changes.borrow_mut();
        changes.record_array_index(index, ChangeEntry::Value(value));
        changes.record_array_length(len);
        drop(changes);
        self.touch();
    }

    pub fn push(&self, value: Value) {
        let index = self.write(|v| {
            let a = v.as_array_mut().expect("push() called on non-array value");
            a.push(value.clone());
            a.len() - 1
        });
        let len = self.len();
        let mut changes = self.changes.borrow_mut();
        changes.record_array_index(index, ChangeEntry::Value(value));
        changes.record_array_length(len);
        drop(changes);
        self.touch();
    }

    pub fn pop(&self) -> Option<Value> {
        let popped = self.write(|v| {
            let a = v.as_array_mut().expect("pop() called on non-array value");
            a.pop()
        });
        let len = self.len();
        self.changes.borrow_mut().record_array_length(len);
        self.touch();
        popped
    }

    /// Replaces `count` elements starting at `start` with `replacement`,
    /// re-recording every affected index and the new length.
    pub fn splice(&self, start: usize, count: usize, replacement: Vec<Value>) {
        self.write(|v| {
            let a = v.as_array_mut().expect("splice() called on non-array value");
            let end = (start + count).min(a.len());
            a.splice(start..end, replacement);
        });
        let len = self.len();
        let touched = self.read(|v| {
            let a = v.as_array().unwrap();
            a[start..].to_vec()
        });
        let mut changes = self.changes.borrow_mut();
        for (offset, value) in touched.into_iter().enumerate() {
            changes.record_array_index(start + offset, ChangeEntry::Value(value));
        }
        changes.record_array_length(len);
        drop(changes);
        self.touch();
    }

    pub fn set_len(&self, new_len: usize) {
        self.write(|v| {
            let a = v.as_array_mut().expect("set_len() called on non-array value");
            a.resize(new_len, Value::Leaf(Leaf::Unit));
        });
        self.changes.borrow_mut().record_array_length(new_len);
        self.touch();
    }

    // ---- keyed object -------------------------------------------------------

    pub fn object_get(&self, key: &str) -> Option<Value> {
        self.read(|v| match v {
            Value::Object(m) => m.get(key).cloned(),
            _ => None,
        })
    }

    pub fn object_set(&self, key: &str, value: Value) {
        self.write(|v| {
            let m = v.as_object_mut().expect("object_set() called on non-object value");
            m.insert(key.to_string(), value.clone());
        });
        self.changes
            .borrow_mut()
            .record_object_key(key, ChangeEntry::Value(value));
        self.touch();
    }

    pub fn object_delete(&self, key: &str) {
        self.write(|v| {
            let m = v.as_object_mut().expect("object_delete() called on non-object value");
            m.remove(key);
        });
        self.changes
            .borrow_mut()
            .record_object_key(key, ChangeEntry::Delete);
        self.touch();
    }

    // ---- set -----------------------------------------------------------------

    pub fn set_add(&self, value: Key) {
        self.write(|v| {
            let s = v.as_set_mut().expect("set_add() called on non-set value");
            s.insert(value.clone());
        });
        self.changes.borrow_mut().record_set_add(value);
        self.touch();
    }

    pub fn set_delete(&self, value: Key) {
        self.write(|v| {
            let s = v.as_set_mut().expect("set_delete() called on non-set value");
            s.remove(&value);
        });
        self.changes.borrow_mut().record_set_remove(value);
        self.touch();
    }

    // ---- keyed map -------------------------------------------------------------

    pub fn map_set(&self, key: Key, value: Value) {
        self.write(|v| {
            let m = v.as_map_mut().expect("map_set() called on non-map value");
            m.insert(key.clone(), value.clone());
        });
        self.changes
            .borrow_mut()
            .record_map_key(key, ChangeEntry::Value(value));
        self.touch();
    }

    pub fn map_delete(&self, key: Key) {
        self.write(|v| {
            let m = v.as_map_mut().expect("map_delete() called on non-map value");
            m.remove(&key);
        });
        self.changes.borrow_mut().record_map_key(key, ChangeEntry::Delete);
        self.memo.borrow_mut().remove(&PathKey::MapKey(key));
        self.touch();
    }

    /// Reads the value at `key`, returning a memoized nested view sharing
    /// this view's root storage when the value is composite.
    pub fn map_view(&self, key: Key) -> ObservedView {
        let child_value = self.write(|v| {
            let m = v.as_map_mut().expect("map_view() called on non-map value");
            m.entry(key.clone())
                .or_insert_with(|| Value::Struct(Default::default()))
                .clone()
        });
        let key_owned = key.clone();
        self.child(PathKey::MapKey(key), &child_value, move |parent_changes, child_changes| {
            parent_changes.record_map_key(key_owned.clone(), ChangeEntry::Nested(child_changes));
        })
    }
}
