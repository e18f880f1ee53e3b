//! Accumulation of named parts.

use std::mem;

/// Values received so far for one name.
///
/// A name seen once holds a single value. A second value for the same name turns it into an
/// ordered list, and every later value is appended to that list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate<T> {
    /// Exactly one value was received.
    Single(T),

    /// Two or more values were received, in arrival order.
    Multiple(Vec<T>),
}

impl<T> Aggregate<T> {
    /// Adds a value, promoting a single value to a list on collision.
    pub fn push(&mut self, value: T) {
        let previous = mem::replace(self, Aggregate::Multiple(Vec::new()));

        *self = match previous {
            Aggregate::Single(first) => Aggregate::Multiple(vec![first, value]),
            Aggregate::Multiple(mut values) => {
                values.push(value);
                Aggregate::Multiple(values)
            }
        };
    }

    /// Returns values in arrival order.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Aggregate::Single(value) => vec![value],
            Aggregate::Multiple(values) => values,
        }
    }
}

/// Name to [`Aggregate`] mapping, built once per request.
///
/// Names are kept in the order they were first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateMap<T> {
    entries: Vec<(String, Aggregate<T>)>,
}

impl<T> Default for AggregateMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> AggregateMap<T> {
    /// Constructs an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value received for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();

        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, aggregate)) => aggregate.push(value),
            None => self.entries.push((name, Aggregate::Single(value))),
        }
    }

    /// Returns the values received for `name`.
    pub fn get(&self, name: &str) -> Option<&Aggregate<T>> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, aggregate)| aggregate)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no value was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates names and their values, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Aggregate<T>)> {
        self.entries
            .iter()
            .map(|(name, aggregate)| (name.as_str(), aggregate))
    }
}

impl<T> IntoIterator for AggregateMap<T> {
    type Item = (String, Aggregate<T>);
    type IntoIter = std::vec::IntoIter<(String, Aggregate<T>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<N: Into<String>, T> FromIterator<(N, T)> for AggregateMap<T> {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        let mut map = AggregateMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}
