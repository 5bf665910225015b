use std::fmt;
use std::marker::PhantomData;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::category::Category;

/// Category-keyed map that remembers insertion order.
///
/// Serialises as a JSON object keyed by the category wire key. Unknown keys
/// are skipped on deserialisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap<T> {
    entries: Vec<(Category, T)>,
}

impl<T> Default for CategoryMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> CategoryMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced entry keeps its original position.
    pub fn insert(&mut self, category: Category, value: T) -> Option<T> {
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((category, value));
                None
            }
        }
    }

    pub fn get(&self, category: Category) -> Option<&T> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, category: Category) -> bool {
        self.get(category).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        self.entries.iter().map(|(c, v)| (*c, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = Category> + '_ {
        self.entries.iter().map(|(c, _)| *c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> FromIterator<(Category, T)> for CategoryMap<T> {
    fn from_iter<I: IntoIterator<Item = (Category, T)>>(iter: I) -> Self {
        let mut map = CategoryMap::new();
        for (category, value) in iter {
            map.insert(category, value);
        }
        map
    }
}

impl<T: Serialize> Serialize for CategoryMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (category, value) in &self.entries {
            map.serialize_entry(category.key(), value)?;
        }
        map.end()
    }
}

struct CategoryMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for CategoryMapVisitor<T> {
    type Value = CategoryMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object keyed by category")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = CategoryMap::new();
        while let Some(key) = access.next_key::<String>()? {
            match key.parse::<Category>() {
                Ok(category) => {
                    let value = access.next_value::<T>()?;
                    map.insert(category, value);
                }
                Err(_) => {
                    access.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(map)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for CategoryMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CategoryMapVisitor(PhantomData))
    }
}
