//! Dynamic Values
//!
//! The reactive engine observes arbitrary, heterogeneous data, so it works on
//! a closed set of value shapes instead of on Rust types directly:
//!
//! - primitives (`Undefined`, `Null`, `Bool`, `Number`, `String`, `Symbol`)
//! - raw targets (`Object`): plain objects, arrays and the keyed collections
//! - proxies (`Proxy`): an interception layer over a target
//! - refs (`Ref`): single-slot reactive boxes
//! - functions (`Function`): callable values, never observed
//!
//! Cloning a `Value` is cheap: every non-primitive variant is a shared handle.
//!
//! # Equality
//!
//! `==` on values is `Object.is`: objects, proxies, refs and functions compare
//! by identity, `NaN` equals itself and `+0` differs from `-0`. Collection keys
//! use the looser SameValueZero comparison through [`Value::identity`].

mod json;
mod key;
mod target;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use key::{Identity, Key, Symbol, MAX_ARRAY_INDEX};
pub use target::{Target, TargetId, TargetKind};

use crate::reactive::{Proxy, Ref};

/// A callable value.
#[derive(Clone)]
pub struct Function {
    id: u64,
    call: Arc<dyn Fn(&[Value]) -> Value + Send + Sync>,
}

impl Function {
    pub fn new<F>(call: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            call: Arc::new(call),
        }
    }

    /// A function that ignores its arguments.
    pub fn getter<F, R>(getter: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::new(move |_| getter().into())
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.call)(args)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function#{}", self.id)
    }
}

/// A dynamically shaped value observed by the reactive engine.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Symbol(Symbol),
    Object(Target),
    Proxy(Proxy),
    Ref(Ref),
    Function(Function),
}

impl Value {
    /// A new, empty plain object.
    pub fn object() -> Self {
        Value::Object(Target::new(TargetKind::Object))
    }

    /// A new plain object holding `entries` in order.
    pub fn object_from<K, I>(entries: I) -> Self
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Target::object(entries))
    }

    /// A new array holding `items`.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Object(Target::array(items))
    }

    /// An empty `Map`.
    pub fn new_map() -> Self {
        Value::Object(Target::new(TargetKind::Map))
    }

    /// An empty `Set`.
    pub fn new_set() -> Self {
        Value::Object(Target::new(TargetKind::Set))
    }

    pub fn new_weak_map() -> Self {
        Value::Object(Target::new(TargetKind::WeakMap))
    }

    pub fn new_weak_set() -> Self {
        Value::Object(Target::new(TargetKind::WeakSet))
    }

    pub fn function<F>(call: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Value::Function(Function::new(call))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Objects, arrays, collections and proxies over them.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
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

    pub fn as_ref(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// JavaScript truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Interpret as an array length: a non-negative integer number.
    pub(crate) fn as_array_length(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// The raw target behind this value, looking through any proxy layers.
    pub fn raw_target(&self) -> Option<Target> {
        match self {
            Value::Object(target) => Some(target.clone()),
            Value::Proxy(proxy) => proxy.raw_target(),
            _ => None,
        }
    }

    /// The target kind behind this value, if it is object-like.
    pub fn kind(&self) -> Option<TargetKind> {
        self.raw_target().map(|t| t.kind())
    }

    pub fn is_array(&self) -> bool {
        self.kind() == Some(TargetKind::Array)
    }

    /// SameValueZero identity, used for collection keys.
    pub fn identity(&self) -> Identity {
        match self {
            Value::Undefined => Identity::Undefined,
            Value::Null => Identity::Null,
            Value::Bool(b) => Identity::Bool(*b),
            Value::Number(n) => Identity::number(*n),
            Value::String(s) => Identity::String(s.clone()),
            Value::Symbol(s) => Identity::Symbol(s.id()),
            Value::Object(t) => Identity::Object(t.id()),
            Value::Proxy(p) => Identity::Proxy(p.id()),
            Value::Ref(r) => Identity::Ref(r.id()),
            Value::Function(f) => Identity::Function(f.id()),
        }
    }

    /// `Object.is`.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            _ => self.identity() == other.identity(),
        }
    }

    /// Replace the prototype of an object-like value.
    ///
    /// Like `Object.setPrototypeOf`, this is not intercepted: it applies to
    /// the raw target behind any proxy.
    pub fn set_prototype_of(&self, proto: Option<Value>) -> bool {
        match self.raw_target() {
            Some(target) => target.set_prototype(proto),
            None => false,
        }
    }

    /// Forbid adding properties to the raw target behind this value.
    pub fn prevent_extensions(&self) {
        if let Some(target) = self.raw_target() {
            target.prevent_extensions();
        }
    }
}

/// Whether a write of `new` over `old` is an observable change.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    !new.same_value(old)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Symbol(s) => write!(f, "{s:?}"),
            Value::Object(t) => write!(f, "{t:?}"),
            Value::Proxy(p) => write!(f, "{p:?}"),
            Value::Ref(r) => write!(f, "{r:?}"),
            Value::Function(func) => write!(f, "{func:?}"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<Target> for Value {
    fn from(t: Target) -> Self {
        Value::Object(t)
    }
}

impl From<Proxy> for Value {
    fn from(p: Proxy) -> Self {
        Value::Proxy(p)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
