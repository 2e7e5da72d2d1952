//! Node Properties
//!
//! Properties are an ordered map from name to [`PropValue`]. The ordering key
//! and, for components, the child list travel alongside the map rather than
//! inside it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{Key, VNode};
use crate::host::Event;
use crate::reactive::Signal;

/// Handler invoked for a delegated event.
pub type EventHandler = Rc<dyn Fn(&Event)>;

/// A single property value.
#[derive(Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Inline style declarations, applied one property at a time.
    Style(IndexMap<String, String>),
    /// Delegated event handler (`on<kind>` keys).
    Handler(EventHandler),
    /// A class name kept in sync with a signal.
    Class(Signal<String>),
    /// Arbitrary data for component props.
    Any(Rc<dyn Any>),
}

impl PropValue {
    /// Build a style value from `(property, value)` pairs.
    pub fn style<K, V>(declarations: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Style(
            declarations
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Truthiness as used by `data-*`/`aria-*` attributes.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Style(_) | Self::Handler(_) | Self::Class(_) | Self::Any(_) => true,
        }
    }

    /// Attribute text for scalar values.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::Class(signal) => Some(signal.get_untracked()),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Style(a), Self::Style(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => Rc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Any(a), Self::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Style(style) => f.debug_tuple("Style").field(style).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Class(signal) => write!(f, "Class({:?})", signal.get_untracked()),
            Self::Any(_) => f.write_str("Any(..)"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for PropValue {
    fn from(value: usize) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Signal<String>> for PropValue {
    fn from(value: Signal<String>) -> Self {
        Self::Class(value)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Properties of an element or component.
#[derive(Clone, Default)]
pub struct Props {
    entries: IndexMap<String, PropValue>,
    key: Option<Key>,
    children: Vec<VNode>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    /// Attach a delegated handler for event `kind` (stored as `on<kind>`).
    pub fn on(mut self, kind: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.entries
            .insert(format!("on{kind}"), PropValue::Handler(Rc::new(handler)));
        self
    }

    /// Pass arbitrary data to a component.
    pub fn with_any<T: 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.entries
            .insert(name.into(), PropValue::Any(Rc::new(value)));
        self
    }

    /// Set the ordering key used by keyed reconciliation.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.entries.get(name) {
            Some(PropValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.entries.get(name) {
            Some(PropValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.entries.get(name) {
            Some(PropValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Data stored with [`with_any`](Self::with_any), if it has type `T`.
    pub fn get_any<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        match self.entries.get(name) {
            Some(PropValue::Any(value)) => value.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Children passed to a component.
    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub(crate) fn take_key(&mut self) -> Option<Key> {
        self.key.take()
    }

    pub(crate) fn set_children(&mut self, children: Vec<VNode>) {
        self.children = children;
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}
