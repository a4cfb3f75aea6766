//! Core types for the mutation tracker.
//!
//! A [`Value`] is either a primitive, a trackable composite ([`ObjectRef`]:
//! a plain map or list with shared identity), or an [`Opaque`] composite that
//! is never tracked.

use crate::error::{self, TrackError};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{ser, Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Pseudo-property exposing a list's length.
pub const LENGTH_KEY: &str = "length";

/// Largest integer an f64 represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Longest list a tracked list may grow to. Index keys at or past it are
/// unsupported.
pub const MAX_LIST_LENGTH: usize = u32::MAX as usize;

// --- Keys ---

/// Property key on a trackable object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Named property.
    Field(String),
    /// List position.
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Integer literals default to `i32`. Negative numbers are plain field names.
impl From<i32> for Key {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(i) => Key::Index(i),
            Err(_) => Key::Field(index.to_string()),
        }
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

// --- Objects ---

/// Shape of a trackable object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Map,
    List,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Map => "map",
            ObjectKind::List => "list",
        }
    }
}

/// Storage behind an [`ObjectRef`].
#[derive(Clone)]
pub(crate) enum Composite {
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
}

/// A key after resolving it against the object's shape.
enum Slot<'a> {
    Field(Cow<'a, str>),
    Index(usize),
    Length,
    Unsupported,
}

impl Composite {
    fn kind(&self) -> ObjectKind {
        match self {
            Composite::Map(_) => ObjectKind::Map,
            Composite::List(_) => ObjectKind::List,
        }
    }

    fn slot<'a>(&self, key: &'a Key) -> Slot<'a> {
        match (self, key) {
            (Composite::Map(_), Key::Field(name)) => Slot::Field(Cow::Borrowed(name.as_str())),
            (Composite::Map(_), Key::Index(i)) => Slot::Field(Cow::Owned(i.to_string())),
            (Composite::List(_), Key::Index(i)) if *i < MAX_LIST_LENGTH => Slot::Index(*i),
            (Composite::List(_), Key::Index(_)) => Slot::Unsupported,
            (Composite::List(_), Key::Field(name)) if name == LENGTH_KEY => Slot::Length,
            (Composite::List(_), Key::Field(name)) => match name.parse::<usize>() {
                // "01" is a plain field, not index 1
                Ok(i) if i < MAX_LIST_LENGTH && i.to_string() == *name => Slot::Index(i),
                _ => Slot::Unsupported,
            },
        }
    }

    pub(crate) fn get(&self, key: &Key) -> Option<Value> {
        match (self, self.slot(key)) {
            (Composite::Map(map), Slot::Field(name)) => map.get(&*name).cloned(),
            (Composite::List(list), Slot::Index(i)) => list.get(i).cloned(),
            (Composite::List(list), Slot::Length) => Some(Value::Number(list.len() as f64)),
            _ => None,
        }
    }

    /// Whether `insert(key, value)` would be applied.
    pub(crate) fn accepts(&self, key: &Key, value: &Value) -> bool {
        match self.slot(key) {
            Slot::Field(_) | Slot::Index(_) => true,
            Slot::Length => list_length(value).is_some(),
            Slot::Unsupported => false,
        }
    }

    /// Write `value` at `key`. Returns false if the write was ignored.
    pub(crate) fn insert(&mut self, key: &Key, value: Value) -> bool {
        let slot = self.slot(key);
        match (self, slot) {
            (Composite::Map(map), Slot::Field(name)) => {
                map.insert(name.into_owned(), value);
                true
            }
            (Composite::List(list), Slot::Index(i)) => {
                let Some(needed) = i.checked_add(1) else {
                    return false;
                };
                let len = needed.max(list.len());
                if !resize_list(list, len) {
                    return false;
                }
                list[i] = value;
                true
            }
            (Composite::List(list), Slot::Length) => match list_length(&value) {
                Some(len) => resize_list(list, len),
                None => false,
            },
            _ => false,
        }
    }

    /// Remove the property at `key`. List slots become Null rather than
    /// shifting later elements.
    pub(crate) fn remove(&mut self, key: &Key) -> Option<Value> {
        let slot = self.slot(key);
        match (self, slot) {
            (Composite::Map(map), Slot::Field(name)) => map.remove(&*name),
            (Composite::List(list), Slot::Index(i)) if i < list.len() => {
                Some(std::mem::replace(&mut list[i], Value::Null))
            }
            _ => None,
        }
    }

    /// The key this shape actually stores `key` under.
    pub(crate) fn canonical_key(&self, key: &Key) -> Key {
        match self.slot(key) {
            Slot::Field(name) => Key::Field(name.into_owned()),
            Slot::Index(i) => Key::Index(i),
            Slot::Length => Key::Field(LENGTH_KEY.to_string()),
            Slot::Unsupported => key.clone(),
        }
    }

    pub(crate) fn keys(&self) -> Vec<Key> {
        match self {
            Composite::Map(map) => map.keys().cloned().map(Key::Field).collect(),
            Composite::List(list) => (0..list.len()).map(Key::Index).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Composite::Map(map) => map.len(),
            Composite::List(list) => list.len(),
        }
    }
}

fn list_length(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_LIST_LENGTH as f64 => {
            Some(*n as usize)
        }
        _ => None,
    }
}

/// Resize `list` to `len`, padding with Null. Returns false, leaving the
/// list untouched, if the allocation fails.
fn resize_list(list: &mut Vec<Value>, len: usize) -> bool {
    if len > list.len() {
        if let Err(error) = list.try_reserve(len - list.len()) {
            tracing::warn!(len, %error, "list growth failed");
            return false;
        }
    }
    list.resize(len, Value::Null);
    true
}

/// Stable identity of a trackable object, valid while the object is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

/// Shared handle to a trackable object (a plain map or list).
///
/// Clones share the same underlying object; the allocation is the object's
/// canonical identity. Reads and writes on an `ObjectRef` are raw and never
/// notify. Go through a [`Facade`](crate::Facade) for tracked access.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Composite>>);

/// Non-owning handle to a trackable object.
#[derive(Clone)]
pub struct WeakObjectRef(Weak<RwLock<Composite>>);

impl ObjectRef {
    /// Create an empty map.
    pub fn new_map() -> Self {
        Self::from_map(BTreeMap::new())
    }

    /// Create an empty list.
    pub fn new_list() -> Self {
        Self::from_list(Vec::new())
    }

    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        Self(Arc::new(RwLock::new(Composite::Map(map))))
    }

    pub fn from_list(list: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(Composite::List(list))))
    }

    pub fn kind(&self) -> ObjectKind {
        self.read().kind()
    }

    pub fn id(&self) -> ObjectId {
        ObjectId(Arc::as_ptr(&self.0) as usize)
    }

    /// True if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Arc::downgrade(&self.0))
    }

    /// Raw read of a property.
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.read().get(&key.into())
    }

    /// Raw write of a property. Returns false if the key is not writable
    /// on this shape (e.g. a non-index field on a list).
    pub fn insert(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        self.write().insert(&key.into(), value.into())
    }

    /// Raw removal of a property.
    pub fn remove(&self, key: impl Into<Key>) -> Option<Value> {
        self.write().remove(&key.into())
    }

    /// Normalize `key` for this object's shape: index keys on a map become
    /// fields, numeric field keys on a list become indices.
    pub fn canonical_key(&self, key: impl Into<Key>) -> Key {
        self.read().canonical_key(&key.into())
    }

    pub fn contains(&self, key: impl Into<Key>) -> bool {
        self.read().get(&key.into()).is_some()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.read().keys()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recursive read lock; comparisons may visit the same object twice.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Composite> {
        self.0.read_recursive()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Composite> {
        self.0.write()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.read() {
            Composite::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Composite::List(list) => f.debug_list().entries(list.iter()).finish(),
        }
    }
}

impl WeakObjectRef {
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    /// True if this handle still points at `object`.
    pub fn refers_to(&self, object: &ObjectRef) -> bool {
        self.upgrade().is_some_and(|live| live.ptr_eq(object))
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakObjectRef")
            .field(&self.0.as_ptr())
            .finish()
    }
}

// --- Opaque ---

/// A composite value that is not a plain map or list.
///
/// Opaque values pass through the tracker untouched: they are never wrapped,
/// registered, or compared structurally.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_name)
    }
}

// --- Values ---

/// A value stored in a trackable object.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Trackable composite (map or list).
    Object(ObjectRef),
    /// Non-plain composite, never tracked.
    Opaque(Opaque),
}

impl Value {
    /// Build a map value from key/value pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Value::Object(ObjectRef::from_map(map))
    }

    /// Build a list value.
    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Value {
        Value::Object(ObjectRef::from_list(
            items.into_iter().map(Into::into).collect(),
        ))
    }

    /// Short name of the value's runtime shape.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) => obj.kind().as_str(),
            Value::Opaque(_) => "opaque",
        }
    }

    /// True for plain maps and lists.
    pub fn is_trackable(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Structural copy with fresh object identities.
    ///
    /// Recurses without cycle detection; a self-referential value never
    /// returns.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Object(obj) => {
                let copy = match &*obj.read() {
                    Composite::Map(map) => Composite::Map(
                        map.iter().map(|(k, v)| (k.clone(), v.deep_clone())).collect(),
                    ),
                    Composite::List(list) => {
                        Composite::List(list.iter().map(Value::deep_clone).collect())
                    }
                };
                Value::Object(ObjectRef(Arc::new(RwLock::new(copy))))
            }
            other => other.clone(),
        }
    }

    /// Snapshot into a JSON value.
    pub fn to_json(&self) -> error::Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => json_number(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(obj) => match &*obj.read() {
                Composite::Map(map) => {
                    let mut out = serde_json::Map::with_capacity(map.len());
                    for (k, v) in map {
                        out.insert(k.clone(), v.to_json()?);
                    }
                    serde_json::Value::Object(out)
                }
                Composite::List(list) => serde_json::Value::Array(
                    list.iter()
                        .map(Value::to_json)
                        .collect::<error::Result<Vec<_>>>()?,
                ),
            },
            Value::Opaque(opaque) => {
                return Err(TrackError::NotSerializable(opaque.type_name().to_string()))
            }
        })
    }
}

/// Integral numbers come out as JSON integers; NaN and infinities as null.
fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        crate::equality::deep_equal(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(obj) => fmt::Debug::fmt(obj, f),
            Value::Opaque(opaque) => fmt::Debug::fmt(opaque, f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(obj) => obj.serialize(serializer),
            Value::Opaque(opaque) => Err(ser::Error::custom(format!(
                "opaque value of type {} is not serializable",
                opaque.type_name()
            ))),
        }
    }
}

impl Serialize for ObjectRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &*self.read() {
            Composite::Map(map) => map.serialize(serializer),
            Composite::List(list) => list.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

// --- Conversions ---

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::list(items),
            serde_json::Value::Object(map) => Value::map(map),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<&ObjectRef> for Value {
    fn from(obj: &ObjectRef) -> Self {
        Value::Object(obj.clone())
    }
}

impl From<Opaque> for Value {
    fn from(opaque: Opaque) -> Self {
        Value::Opaque(opaque)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Object(ObjectRef::from_list(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
