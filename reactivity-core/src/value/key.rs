//! Property keys, symbols and value identities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::target::TargetId;
use crate::reactive::{ProxyId, RefId};

/// Ids below this value are reserved for well-known symbols.
const FIRST_USER_SYMBOL: u64 = 16;

const ITERATOR: u64 = 1;
const ASYNC_ITERATOR: u64 = 2;
const HAS_INSTANCE: u64 = 3;
const TO_PRIMITIVE: u64 = 4;
const TO_STRING_TAG: u64 = 5;

/// A unique property key that can never collide with a string key.
///
/// Well-known symbols (`Symbol::iterator()` and friends) are builtin hooks and
/// are never tracked as dependencies.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    /// Create a new, unique symbol.
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(FIRST_USER_SYMBOL);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    fn well_known(id: u64, description: &str) -> Self {
        Self {
            id,
            description: Arc::from(description),
        }
    }

    pub fn iterator() -> Self {
        Self::well_known(ITERATOR, "Symbol.iterator")
    }

    pub fn async_iterator() -> Self {
        Self::well_known(ASYNC_ITERATOR, "Symbol.asyncIterator")
    }

    pub fn has_instance() -> Self {
        Self::well_known(HAS_INSTANCE, "Symbol.hasInstance")
    }

    pub fn to_primitive() -> Self {
        Self::well_known(TO_PRIMITIVE, "Symbol.toPrimitive")
    }

    pub fn to_string_tag() -> Self {
        Self::well_known(TO_STRING_TAG, "Symbol.toStringTag")
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_well_known(&self) -> bool {
        self.id < FIRST_USER_SYMBOL
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// A property key of an object or array.
///
/// String keys that look like array indices (`"0"`, `"17"`, but not `"01"` or
/// `"-1"`) are normalised to [`Key::Index`], so `Key::from("3") == Key::from(3)`.
/// Only values up to [`MAX_ARRAY_INDEX`] are indices; larger integers stay
/// plain names.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(Arc<str>),
    Symbol(Symbol),
}

/// Largest array index (`2^32 - 2`). Array lengths never exceed `2^32 - 1`.
pub const MAX_ARRAY_INDEX: usize = u32::MAX as usize - 1;

/// Keys that are never tracked.
const NON_TRACKABLE: [&str; 3] = ["__proto__", "__v_isRef", "__isVue"];

impl Key {
    /// The `length` key of arrays; also the array iteration sentinel.
    pub fn length() -> Self {
        Key::Name(Arc::from("length"))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == "length")
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Key::Index(_))
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Builtin symbols and internal names bypass dependency tracking.
    pub(crate) fn is_non_trackable(&self) -> bool {
        match self {
            Key::Symbol(symbol) => symbol.is_well_known(),
            Key::Name(name) => NON_TRACKABLE.contains(&&**name),
            Key::Index(_) => false,
        }
    }

    /// Convert to the value a `for..in` loop would see.
    pub fn to_value(&self) -> super::Value {
        match self {
            Key::Index(index) => super::Value::String(Arc::from(index.to_string())),
            Key::Name(name) => super::Value::String(name.clone()),
            Key::Symbol(symbol) => super::Value::Symbol(symbol.clone()),
        }
    }
}

fn parse_index(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    name.parse::<usize>()
        .ok()
        .filter(|index| *index <= MAX_ARRAY_INDEX)
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        match parse_index(name) {
            Some(index) => Key::Index(index),
            None => Key::Name(Arc::from(name)),
        }
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::from(name.as_str())
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::from(name.as_str())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        if index <= MAX_ARRAY_INDEX {
            Key::Index(index)
        } else {
            Key::Name(Arc::from(index.to_string()))
        }
    }
}

impl From<u32> for Key {
    fn from(index: u32) -> Self {
        Key::from(index as usize)
    }
}

impl From<i32> for Key {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => Key::from(index),
            Err(_) => Key::Name(Arc::from(index.to_string())),
        }
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Key::Symbol(symbol)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{index}"),
            Key::Name(name) => f.write_str(name),
            Key::Symbol(symbol) => write!(f, "{symbol:?}"),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{index}"),
            Key::Name(name) => write!(f, "{name:?}"),
            Key::Symbol(symbol) => write!(f, "{symbol:?}"),
        }
    }
}

/// SameValueZero identity of a value.
///
/// Used as the key of Map/Set storage and of collection entry dependencies.
/// Objects, proxies, refs and functions compare by identity; `NaN` equals
/// itself and `+0` equals `-0`. Identities never keep a target alive.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Identity {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(Arc<str>),
    Symbol(u64),
    Object(TargetId),
    Proxy(ProxyId),
    Ref(RefId),
    Function(u64),
}

impl Identity {
    pub(crate) fn number(n: f64) -> Self {
        if n.is_nan() {
            Identity::Number(f64::NAN.to_bits())
        } else if n == 0.0 {
            Identity::Number(0)
        } else {
            Identity::Number(n.to_bits())
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
