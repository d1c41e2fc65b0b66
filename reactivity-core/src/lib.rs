//! Reactivity Core
//!
//! This crate provides a fine-grained reactive-state engine. It implements:
//!
//! - A dynamic value model with objects, arrays and keyed collections
//! - Effects with automatic dependency tracking
//! - Reactive, readonly and shallow proxies over raw data
//! - Refs and lazily cached computed values
//!
//! # Architecture
//!
//! The crate is organized into a few modules:
//!
//! - `value`: the [`Value`] enum, raw targets, property keys and the JSON bridge
//! - `reactive`: dependency store, effects, track/trigger, proxies, refs, computeds
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use reactivity_core::reactive::{effect, reactive};
//! use reactivity_core::Value;
//!
//! let state = reactive(Value::object_from([("count", Value::from(0))]));
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let (state_clone, seen_clone) = (state.clone(), seen.clone());
//! let _runner = effect(move || {
//!     seen_clone.lock().unwrap().push(state_clone.get("count"));
//! });
//!
//! state.set("count", 1);
//! state.set("count", 2);
//! assert_eq!(*seen.lock().unwrap(), vec![Value::from(0), Value::from(1), Value::from(2)]);
//! ```

pub mod error;
pub mod reactive;
pub mod value;

pub use error::{ReactivityError, Result};
pub use value::{has_changed, Function, Identity, Key, Symbol, Target, TargetId, TargetKind, Value};
