use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// A scalar leaf value. Every composite shape (struct, array, object, set,
/// map) bottoms out in one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A hashable/orderable scalar, used for set elements and map keys. Floats
/// are deliberately excluded — they cannot key a `Set`/`Map` without a
/// total order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// A uniform, tagged value tree stands in for per-schema generated wrapper
/// types. Every component's schema-defined fields are one of these shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Leaf(Leaf),
    /// A record: field name -> value (struct field assignment).
    Struct(BTreeMap<String, Value>),
    /// An ordered array (push/pop/splice/index assignment/length).
    Array(Vec<Value>),
    /// A keyed object with string keys (assignment and deletion).
    Object(BTreeMap<String, Value>),
    /// A set of scalar leaves.
    Set(BTreeSet<Key>),
    /// A keyed map whose values may themselves be composite.
    Map(BTreeMap<Key, Value>),
}

impl Value {
    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Struct(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Struct(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut BTreeSet<Key>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<Key, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Walks a dotted path (`a.b.c`) to a leaf, writing `value` there.
    /// Intermediate segments must resolve to `Struct`/`Object` nodes; used
    /// by `World::patch`.
    pub fn write_path(&mut self, path: &str, value: Value) -> bool {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return false;
        };
        let rest: Vec<&str> = segments.collect();
        self.write_segments(first, &rest, value)
    }

    fn write_segments(&mut self, field: &str, rest: &[&str], value: Value) -> bool {
        let map = match self {
            Value::Struct(m) => m,
            Value::Object(m) => m,
            _ => return false,
        };
        if rest.is_empty() {
            map.insert(field.to_string(), value);
            return true;
        }
        let Some(next) = map.get_mut(field) else {
            return false;
        };
        next.write_segments(rest[0], &rest[1..], value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_path_sets_nested_field() {
        let mut inner = BTreeMap::new();
        inner.insert("y".to_string(), Value::Leaf(Leaf::Int(0)));
        let mut outer = BTreeMap::new();
        outer.insert("x".to_string(), Value::Struct(inner));
        let mut v = Value::Struct(outer);

        assert!(v.write_path("x.y", Value::Leaf(Leaf::Int(5))));
        let x = v.as_struct().unwrap().get("x").unwrap();
        assert_eq!(
            x.as_struct().unwrap().get("y").unwrap(),
            &Value::Leaf(Leaf::Int(5))
        );
    }

    #[test]
    fn write_path_missing_segment_fails() {
        let mut v = Value::Struct(BTreeMap::new());
        assert!(!v.write_path("missing.field", Value::Leaf(Leaf::Unit)));
    }
}
