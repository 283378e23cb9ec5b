//! tagmap is the map of key, value pairs that sits inside each
//! `metric::MetricPoint`. Think of it as a specialized hashmap. Unlike a
//! hashmap the order in which tags are inserted is the order in which they are
//! emitted on the wire, which lets collectors control the shape of their
//! output lines.

use std::slice::Iter;

/// The tagmap key, value collection. Behaves similarly to
/// `std::collections::HashMap` but with a specialized implementation for fast
/// searching over a small collection that remembers insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagMap<K, V> {
    inner: Vec<(K, V)>,
}

impl<K, V> TagMap<K, V>
where
    K: PartialEq,
{
    /// Iterate the pairs in insertion order.
    pub fn iter(&self) -> Iter<(K, V)> {
        self.inner.iter()
    }

    /// Insert a key / value into self
    ///
    /// An existing key keeps its position and has its value replaced, the
    /// previous value being returned. New keys are appended.
    pub fn insert(&mut self, key: K, val: V) -> Option<V> {
        match self.inner.iter().position(|&(ref k, _)| *k == key) {
            Some(idx) => Some(::std::mem::replace(&mut self.inner[idx].1, val)),
            None => {
                self.inner.push((key, val));
                None
            }
        }
    }
}

impl<K, V> Default for TagMap<K, V> {
    fn default() -> TagMap<K, V> {
        TagMap {
            inner: Vec::with_capacity(8),
        }
    }
}
