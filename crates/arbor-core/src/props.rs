use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// Name reserved for an element's children; never stored as a regular prop.
pub const CHILDREN_PROP: &str = "children";

type CallbackFn = dyn Fn(&[PropValue]) + Send + Sync;

/// Event handler prop. Compared by identity, so a closure rebuilt on every
/// render always shows up in the props diff.
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    pub fn new(f: impl Fn(&[PropValue]) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[PropValue]) {
        (self.0)(args)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", self.addr())
    }
}

/// A prop or state value.
#[derive(Clone, Default)]
pub enum PropValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PropValue>),
    Map(IndexMap<String, PropValue>),
    Callback(Callback),
    /// Host-specific handle, compared by identity.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl PropValue {
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        PropValue::Opaque(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Float(value) => Some(*value),
            PropValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropValue]> {
        match self {
            PropValue::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            PropValue::Callback(callback) => Some(callback),
            _ => None,
        }
    }

    pub fn downcast_opaque<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            PropValue::Opaque(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Null, PropValue::Null) => true,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            // Bitwise so that NaN props do not register as a change every render.
            (PropValue::Float(a), PropValue::Float(b)) => a.to_bits() == b.to_bits(),
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::List(a), PropValue::List(b)) => a == b,
            (PropValue::Map(a), PropValue::Map(b)) => a == b,
            (PropValue::Callback(a), PropValue::Callback(b)) => a == b,
            (PropValue::Opaque(a), PropValue::Opaque(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("Null"),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value:?}"),
            PropValue::Str(value) => write!(f, "{value:?}"),
            PropValue::List(values) => f.debug_list().entries(values).finish(),
            PropValue::Map(values) => f.debug_map().entries(values).finish(),
            PropValue::Callback(callback) => callback.fmt(f),
            PropValue::Opaque(value) => write!(f, "Opaque({:p})", Arc::as_ptr(value) as *const ()),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<usize> for PropValue {
    fn from(value: usize) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(values: Vec<PropValue>) -> Self {
        PropValue::List(values)
    }
}

impl From<Callback> for PropValue {
    fn from(callback: Callback) -> Self {
        PropValue::Callback(callback)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(PropValue::Null)
    }
}

/// Ordered property mapping of one element.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct Props {
    entries: IndexMap<String, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub(crate) fn insert(&mut self, name: String, value: PropValue) {
        self.entries.insert(name, value);
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Props::new();
        for (name, value) in iter {
            let name = name.into();
            if name == CHILDREN_PROP {
                log::warn!("`{CHILDREN_PROP}` is reserved for child elements; prop ignored");
                continue;
            }
            props.insert(name, value.into());
        }
        props
    }
}

/// Old and new value of one changed prop. `None` marks an added or removed
/// prop.
#[derive(Clone, Debug, PartialEq)]
pub struct PropChange {
    pub old: Option<PropValue>,
    pub new: Option<PropValue>,
}

/// Changed props of one instance. Props missing from the diff are unchanged
/// and must not be re-applied by the widget adapter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropsDiff {
    changes: IndexMap<String, PropChange>,
}

impl PropsDiff {
    /// Diff for a freshly mounted instance: every prop is added.
    pub fn mount(props: &Props) -> Self {
        Self::between(&Props::default(), props)
    }

    pub fn between(old: &Props, new: &Props) -> Self {
        let mut changes = IndexMap::new();
        for (name, value) in new.entries.iter() {
            let previous = old.entries.get(name);
            if previous != Some(value) {
                changes.insert(
                    name.clone(),
                    PropChange {
                        old: previous.cloned(),
                        new: Some(value.clone()),
                    },
                );
            }
        }
        for (name, value) in old.entries.iter() {
            if !new.entries.contains_key(name) {
                changes.insert(
                    name.clone(),
                    PropChange {
                        old: Some(value.clone()),
                        new: None,
                    },
                );
            }
        }
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.changes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropChange> {
        self.changes.get(name)
    }

    /// New value of a changed prop; `None` when unchanged or removed.
    pub fn new_value(&self, name: &str) -> Option<&PropValue> {
        self.changes.get(name).and_then(|change| change.new.as_ref())
    }

    pub fn was_removed(&self, name: &str) -> bool {
        matches!(self.changes.get(name), Some(PropChange { new: None, .. }))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropChange)> {
        self.changes.iter().map(|(name, change)| (name.as_str(), change))
    }
}
