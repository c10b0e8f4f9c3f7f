//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

//! Order-independent container for YANG list nodes.
//!
//! A [`KeyedList`] serializes to a JSON array but behaves like a map keyed by
//! a projection of each element, so two lists holding the same rows compare
//! equal regardless of the order the device returned them in. An
//! uninitialized list serializes to `null` while an initialized empty list
//! serializes to `[]`.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// Elements that can be stored in a [`KeyedList`].
pub trait Keyed {
    type Key: Ord + Clone;

    /// Derives the list key from the element.
    fn key(&self) -> Self::Key;
}

pub struct KeyedList<V: Keyed> {
    entries: Option<BTreeMap<V::Key, V>>,
}

// ===== impl KeyedList =====

impl<V: Keyed> KeyedList<V> {
    /// Creates an initialized, empty list.
    pub fn new() -> KeyedList<V> {
        KeyedList {
            entries: Some(BTreeMap::new()),
        }
    }

    /// Creates an uninitialized list.
    pub fn null() -> KeyedList<V> {
        KeyedList { entries: None }
    }

    pub fn is_null(&self) -> bool {
        self.entries.is_none()
    }

    pub fn get(&self, key: &V::Key) -> Option<&V> {
        self.entries.as_ref().and_then(|entries| entries.get(key))
    }

    pub fn get_mut(&mut self, key: &V::Key) -> Option<&mut V> {
        self.entries.as_mut().and_then(|entries| entries.get_mut(key))
    }

    /// Inserts the element, replacing any element with the same key.
    pub fn set(&mut self, value: V) -> Option<V> {
        self.entries
            .get_or_insert_with(BTreeMap::new)
            .insert(value.key(), value)
    }

    pub fn delete(&mut self, key: &V::Key) -> Option<V> {
        self.entries.as_mut().and_then(|entries| entries.remove(key))
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &V::Key) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &V::Key> {
        self.entries.iter().flat_map(|entries| entries.keys())
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().flat_map(|entries| entries.values())
    }
}

impl<V: Keyed + Clone> Clone for KeyedList<V> {
    fn clone(&self) -> KeyedList<V> {
        KeyedList {
            entries: self.entries.clone(),
        }
    }
}

impl<V> std::fmt::Debug for KeyedList<V>
where
    V: Keyed + std::fmt::Debug,
    V::Key: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.entries {
            None => write!(f, "null"),
            Some(entries) => f.debug_list().entries(entries.values()).finish(),
        }
    }
}

// Lists are equal when they hold the same key to value mappings.
impl<V: Keyed + PartialEq> PartialEq for KeyedList<V> {
    fn eq(&self, other: &KeyedList<V>) -> bool {
        self.entries == other.entries
    }
}

impl<V: Keyed + Eq> Eq for KeyedList<V> {}

impl<V: Keyed> Default for KeyedList<V> {
    fn default() -> KeyedList<V> {
        KeyedList::null()
    }
}

impl<V: Keyed> FromIterator<V> for KeyedList<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> KeyedList<V> {
        let mut list = KeyedList::new();
        list.extend(iter);
        list
    }
}

impl<V: Keyed> Extend<V> for KeyedList<V> {
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for value in iter {
            self.set(value);
        }
    }
}

impl<V: Keyed> IntoIterator for KeyedList<V> {
    type Item = V;
    type IntoIter = std::iter::Flatten<
        std::option::IntoIter<btree_map::IntoValues<V::Key, V>>,
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.entries
            .map(|entries| entries.into_values())
            .into_iter()
            .flatten()
    }
}

impl<V> Serialize for KeyedList<V>
where
    V: Keyed + Serialize,
{
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match &self.entries {
            None => serializer.serialize_none(),
            Some(entries) => {
                let mut seq = serializer.serialize_seq(Some(entries.len()))?;
                for value in entries.values() {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de, V> Deserialize<'de> for KeyedList<V>
where
    V: Keyed + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<KeyedList<V>, D::Error> {
        let values = Option::<Vec<V>>::deserialize(deserializer)?;
        Ok(match values {
            None => KeyedList::null(),
            Some(values) => values.into_iter().collect(),
        })
    }
}

// ===== unit tests =====
