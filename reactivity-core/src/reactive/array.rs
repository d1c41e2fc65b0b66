//! Array Methods
//!
//! Generic array algorithms over the property traps, so the same code serves
//! raw arrays, reactive arrays and readonly arrays.
//!
//! # Instrumentation
//!
//! On a mutable array proxy two things change:
//!
//! - Searches (`index_of`, `last_index_of`, `includes`) scan through the
//!   proxy first, which tracks `length` and every index read. A miss is
//!   retried on the raw array, so a raw needle still finds its slot.
//!
//! - Mutators (`push`, `pop`, `shift`, `unshift`, `splice`) run with tracking
//!   paused. They read `length` internally, and two effects pushing to the
//!   same array would otherwise re-trigger each other forever.

use super::context::TrackingPause;
use crate::value::{Key, Target, Value};

#[derive(Clone, Copy)]
enum Search {
    First,
    Last,
    Includes,
}

/// `===`: numbers compare numerically (`NaN` never matches), everything else
/// by identity.
fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a == b,
        _ => a.same_value(b),
    }
}

fn scan(array: &Value, needle: &Value, search: Search) -> Option<usize> {
    let len = array.len();
    let matches = |index: usize| match search {
        // `includes` sees holes as `undefined`.
        Search::Includes => array.get(index).identity() == needle.identity(),
        Search::First | Search::Last => {
            array.has(index) && strict_equals(&array.get(index), needle)
        }
    };
    match search {
        Search::Last => (0..len).rev().find(|&index| matches(index)),
        Search::First | Search::Includes => (0..len).find(|&index| matches(index)),
    }
}

impl Value {
    /// The raw array behind a mutable array proxy.
    fn instrumented_array(&self) -> Option<Target> {
        let Value::Proxy(proxy) = self else {
            return None;
        };
        match proxy.flags() {
            Some(flags) if !flags.readonly => proxy.raw_target().filter(Target::is_array),
            _ => None,
        }
    }

    fn search(&self, needle: &Value, search: Search) -> Option<usize> {
        let found = scan(self, needle, search);
        match (found, self.instrumented_array()) {
            (None, Some(raw)) => scan(&Value::Object(raw), needle, search),
            (found, _) => found,
        }
    }

    /// Pause tracking while a mutator runs on a mutable array proxy.
    fn mutation_guard(&self) -> Option<TrackingPause> {
        self.instrumented_array().map(|_| TrackingPause::new())
    }

    /// The `length` property, or 0 when it is missing or invalid.
    pub fn len(&self) -> usize {
        self.get(Key::length()).as_array_length().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Array.prototype.indexOf`: strict equality, holes skipped.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, Search::First)
    }

    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, Search::Last)
    }

    /// `Array.prototype.includes`: SameValueZero, so `NaN` is found.
    pub fn includes(&self, needle: &Value) -> bool {
        self.search(needle, Search::Includes).is_some()
    }

    /// Append `items`; returns the new length.
    pub fn push<I>(&self, items: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let _pause = self.mutation_guard();
        let mut len = self.len();
        for item in items {
            self.set(len, item);
            len += 1;
        }
        self.set(Key::length(), len);
        len
    }

    /// Remove and return the last element (`Undefined` when empty).
    pub fn pop(&self) -> Value {
        let _pause = self.mutation_guard();
        let len = self.len();
        if len == 0 {
            self.set(Key::length(), 0);
            return Value::Undefined;
        }
        let last = len - 1;
        let element = self.get(last);
        self.delete(last);
        self.set(Key::length(), last);
        element
    }

    /// Remove and return the first element, moving the rest down.
    pub fn shift(&self) -> Value {
        let _pause = self.mutation_guard();
        let len = self.len();
        if len == 0 {
            self.set(Key::length(), 0);
            return Value::Undefined;
        }
        let first = self.get(0);
        for from in 1..len {
            self.move_item(from, from - 1);
        }
        self.delete(len - 1);
        self.set(Key::length(), len - 1);
        first
    }

    /// Prepend `items`; returns the new length.
    pub fn unshift<I>(&self, items: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let _pause = self.mutation_guard();
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let len = self.len();
        let count = items.len();
        if count > 0 {
            for from in (0..len).rev() {
                self.move_item(from, from + count);
            }
            for (index, item) in items.into_iter().enumerate() {
                self.set(index, item);
            }
        }
        self.set(Key::length(), len + count);
        len + count
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    ///
    /// A negative `start` counts from the end. `None` deletes to the end.
    /// Returns the removed elements as a new raw array.
    pub fn splice<I>(&self, start: i64, delete_count: Option<usize>, items: I) -> Value
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let _pause = self.mutation_guard();
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let len = self.len();
        let start = if start < 0 {
            len.saturating_sub(start.unsigned_abs() as usize)
        } else {
            (start as usize).min(len)
        };
        let delete_count = delete_count.unwrap_or(len - start).min(len - start);

        let removed = Value::array(Vec::new());
        for offset in 0..delete_count {
            if self.has(start + offset) {
                removed.set(offset, self.get(start + offset));
            }
        }
        removed.set(Key::length(), delete_count);

        let count = items.len();
        if count < delete_count {
            for from in (start + delete_count)..len {
                self.move_item(from, from - delete_count + count);
            }
            for index in ((len - delete_count + count)..len).rev() {
                self.delete(index);
            }
        } else if count > delete_count {
            for from in ((start + delete_count)..len).rev() {
                self.move_item(from, from + count - delete_count);
            }
        }
        for (offset, item) in items.into_iter().enumerate() {
            self.set(start + offset, item);
        }
        self.set(Key::length(), len - delete_count + count);
        removed
    }

    /// Copy slot `from` to `to`, carrying holes along.
    fn move_item(&self, from: usize, to: usize) {
        if self.has(from) {
            self.set(to, self.get(from));
        } else {
            self.delete(to);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
