//! Decoding of flat part names into nested values.
//!
//! Part names may use bracket paths to describe structure:
//!
//! - `avatar[small]` and `avatar[large]` produce a map under `avatar`,
//! - `photos[]` appends to a list under `photos`,
//! - `photos[1]` and `photos[0]` produce a list ordered by index.
//!
//! Indices above 20 are treated as map keys, and only the first five bracket groups of a name
//! are expanded; whatever follows is kept as one literal key.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    aggregate::{Aggregate, AggregateMap},
    error::DecodeError,
};

const MAX_DEPTH: usize = 5;
const MAX_INDEX: usize = 20;

/// Top level of a decoded value: part names mapped to their nodes.
pub type Tree<T> = BTreeMap<String, Node<T>>;

/// A decoded value.
///
/// Serializes to the plain value, an array or an object respectively.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node<T> {
    /// A single value.
    Leaf(T),

    /// Values received under a repeated name, an appending (`[]`) or an indexed (`[0]`) path.
    List(Vec<Node<T>>),

    /// Values received under keyed paths (`[name]`).
    Map(Tree<T>),
}

impl<T> Node<T> {
    /// Returns the value if this node is a leaf.
    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            Node::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the items if this node is a list.
    pub fn as_list(&self) -> Option<&[Node<T>]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries if this node is a map.
    pub fn as_map(&self) -> Option<&Tree<T>> {
        match self {
            Node::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up `key` if this node is a map.
    pub fn get(&self, key: &str) -> Option<&Node<T>> {
        self.as_map().and_then(|entries| entries.get(key))
    }

    /// Collects every leaf value, depth first.
    pub fn leaves(&self) -> Vec<&T> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a T>) {
        match self {
            Node::Leaf(value) => leaves.push(value),
            Node::List(items) => items.iter().for_each(|item| item.collect_leaves(leaves)),
            Node::Map(entries) => entries
                .values()
                .for_each(|item| item.collect_leaves(leaves)),
        }
    }
}

/// Decodes accumulated parts into a nested structure.
///
/// A name received once maps to a leaf; a name received several times maps to a list of leaves
/// in arrival order. Bracket paths are expanded as described in the [module docs](self).
///
/// # Errors
/// Returns [`DecodeError::Conflict`] if two names disagree about the shape at some path, e.g.
/// `upload` and `upload[thumb]`.
pub fn decode<T>(parts: AggregateMap<T>) -> Result<Tree<T>, DecodeError> {
    let mut root = BTreeMap::new();

    for (name, values) in parts {
        let draft = nest(split_name(&name), Draft::from_values(values));
        let entries = draft.into_entries(&name)?;
        merge_entries(&mut root, entries, "")?;
    }

    Ok(root
        .into_iter()
        .map(|(key, draft)| (key, draft.into_node()))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Append,
}

impl Segment {
    fn from_group(inner: &str) -> Self {
        if inner.is_empty() {
            return Segment::Append;
        }

        match inner.parse::<usize>() {
            Ok(index) if index <= MAX_INDEX && index.to_string() == inner => Segment::Index(index),
            _ => Segment::Key(inner.to_owned()),
        }
    }
}

/// Splits `name` into its parent key and bracket groups.
fn split_name(name: &str) -> Vec<Segment> {
    let Some((start, end)) = next_group(name, 0) else {
        return vec![Segment::Key(name.to_owned())];
    };

    let mut segments = Vec::new();

    if start > 0 {
        segments.push(Segment::Key(name[..start].to_owned()));
    }

    let mut group = Some((start, end));
    let mut depth = 0;

    while let Some((start, end)) = group {
        if depth == MAX_DEPTH {
            segments.push(Segment::Key(name[start..].to_owned()));
            break;
        }

        segments.push(Segment::from_group(&name[start + 1..end]));
        depth += 1;
        group = next_group(name, end + 1);
    }

    segments
}

/// Finds the next `[...]` group without nested brackets, starting at byte offset `from`.
fn next_group(name: &str, from: usize) -> Option<(usize, usize)> {
    let mut open = None;

    for (idx, byte) in name.bytes().enumerate().skip(from) {
        match byte {
            b'[' => open = Some(idx),
            b']' => {
                if let Some(start) = open {
                    return Some((start, idx));
                }
            }
            _ => {}
        }
    }

    None
}

/// Intermediate value; lists are kept sparse until decoding is complete.
#[derive(Debug)]
enum Draft<T> {
    Leaf(T),
    Array(BTreeMap<usize, Draft<T>>),
    Object(BTreeMap<String, Draft<T>>),
}

impl<T> Draft<T> {
    fn from_values(values: Aggregate<T>) -> Self {
        match values {
            Aggregate::Single(value) => Draft::Leaf(value),
            Aggregate::Multiple(values) => {
                Draft::Array(values.into_iter().map(Draft::Leaf).enumerate().collect())
            }
        }
    }

    fn is_container(&self) -> bool {
        !matches!(self, Draft::Leaf(_))
    }

    fn into_items(self) -> BTreeMap<usize, Draft<T>> {
        match self {
            Draft::Array(items) => items,
            other => BTreeMap::from([(0, other)]),
        }
    }

    fn into_entries(self, path: &str) -> Result<BTreeMap<String, Draft<T>>, DecodeError> {
        match self {
            Draft::Object(entries) => Ok(entries),
            Draft::Array(items) => Ok(index_keys(items)),
            Draft::Leaf(_) => Err(DecodeError::Conflict(path.to_owned())),
        }
    }

    fn into_node(self) -> Node<T> {
        match self {
            Draft::Leaf(value) => Node::Leaf(value),
            Draft::Array(items) => Node::List(items.into_values().map(Draft::into_node).collect()),
            Draft::Object(entries) => Node::Map(
                entries
                    .into_iter()
                    .map(|(key, draft)| (key, draft.into_node()))
                    .collect(),
            ),
        }
    }
}

/// Wraps `leaf` in the containers described by `segments`, innermost last.
fn nest<T>(segments: Vec<Segment>, leaf: Draft<T>) -> Draft<T> {
    segments
        .into_iter()
        .rev()
        .fold(leaf, |leaf, segment| match segment {
            Segment::Append => Draft::Array(leaf.into_items()),
            Segment::Index(index) => Draft::Array(BTreeMap::from([(index, leaf)])),
            Segment::Key(key) => Draft::Object(BTreeMap::from([(key, leaf)])),
        })
}

fn merge<T>(target: Draft<T>, source: Draft<T>, path: &str) -> Result<Draft<T>, DecodeError> {
    match (target, source) {
        (Draft::Object(mut entries), source @ (Draft::Object(_) | Draft::Array(_))) => {
            merge_entries(&mut entries, source.into_entries(path)?, path)?;
            Ok(Draft::Object(entries))
        }

        (Draft::Array(items), Draft::Object(source)) => {
            let mut entries = index_keys(items);
            merge_entries(&mut entries, source, path)?;
            Ok(Draft::Object(entries))
        }

        (Draft::Array(mut items), Draft::Array(source)) => {
            for (index, item) in source {
                match items.remove(&index) {
                    Some(existing) if existing.is_container() && item.is_container() => {
                        let path = child_path(path, &index.to_string());
                        items.insert(index, merge(existing, item, &path)?);
                    }
                    Some(existing) => {
                        items.insert(index, existing);
                        push(&mut items, item);
                    }
                    None => {
                        items.insert(index, item);
                    }
                }
            }
            Ok(Draft::Array(items))
        }

        (Draft::Array(mut items), leaf @ Draft::Leaf(_)) => {
            push(&mut items, leaf);
            Ok(Draft::Array(items))
        }

        (leaf @ Draft::Leaf(_), Draft::Array(source)) => {
            let mut items = BTreeMap::from([(0, leaf)]);
            source.into_values().for_each(|item| push(&mut items, item));
            Ok(Draft::Array(items))
        }

        (first @ Draft::Leaf(_), second @ Draft::Leaf(_)) => {
            Ok(Draft::Array(BTreeMap::from([(0, first), (1, second)])))
        }

        (Draft::Object(_), Draft::Leaf(_)) | (Draft::Leaf(_), Draft::Object(_)) => {
            Err(DecodeError::Conflict(path.to_owned()))
        }
    }
}

fn merge_entries<T>(
    entries: &mut BTreeMap<String, Draft<T>>,
    source: BTreeMap<String, Draft<T>>,
    path: &str,
) -> Result<(), DecodeError> {
    for (key, item) in source {
        let path = child_path(path, &key);

        let merged = match entries.remove(&key) {
            Some(existing) => merge(existing, item, &path)?,
            None => item,
        };

        entries.insert(key, merged);
    }

    Ok(())
}

fn push<T>(items: &mut BTreeMap<usize, Draft<T>>, item: Draft<T>) {
    let next = items.keys().next_back().map_or(0, |last| last + 1);
    items.insert(next, item);
}

fn index_keys<T>(items: BTreeMap<usize, Draft<T>>) -> BTreeMap<String, Draft<T>> {
    items
        .into_iter()
        .map(|(index, item)| (index.to_string(), item))
        .collect()
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}[{key}]")
    }
}
