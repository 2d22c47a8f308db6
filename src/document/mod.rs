//! The configuration document tree.
//!
//! A document is a single root [`ConfigNode`] of map kind. Maps keep their
//! keys in insertion order so a persisted document reads back exactly as
//! it was written.

pub mod codec;
pub mod path;

pub use path::ConfigPath;

use crate::error::PathError;

/// Leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

/// One node of the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Scalar(Scalar),
    List(Vec<ConfigNode>),
    Map(ConfigMap),
}

/// Shape of a node, used by schema rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Scalar,
    List,
    Map,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::List => "list",
            Self::Map => "map",
        }
    }
}

/// String-keyed map that preserves insertion order.
///
/// Lookups are linear; configuration maps hold a few dozen keys at most.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    entries: Vec<(String, ConfigNode)>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigNode> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: ConfigNode) -> Option<ConfigNode> {
        let key = key.into();
        if let Some(index) = self.entries.iter().position(|(k, _)| k == &key) {
            return Some(std::mem::replace(&mut self.entries[index].1, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Remove a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<ConfigNode> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Get the value for `key`, inserting `make()` at the end first if absent.
    pub fn get_or_insert_with(
        &mut self,
        key: &str,
        make: impl FnOnce() -> ConfigNode,
    ) -> &mut ConfigNode {
        let index = match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => index,
            None => {
                self.entries.push((key.to_string(), make()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, ConfigNode)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (String, ConfigNode)>>(iter: I) -> Self {
        let mut map = ConfigMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl ConfigNode {
    /// An empty map, the shape of a fresh document root.
    pub fn empty_map() -> Self {
        ConfigNode::Map(ConfigMap::new())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            ConfigNode::Scalar(_) => NodeKind::Scalar,
            ConfigNode::List(_) => NodeKind::List,
            ConfigNode::Map(_) => NodeKind::Map,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigNode::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigNode::Scalar(Scalar::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigNode::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            ConfigNode::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigNode]> {
        match self {
            ConfigNode::List(items) => Some(items),
            _ => None,
        }
    }

    /// Resolve `path` against this node. Absence at any depth is `None`.
    ///
    /// An append path never resolves to anything.
    pub fn resolve(&self, path: &ConfigPath) -> Option<&ConfigNode> {
        if path.is_append() {
            return None;
        }
        let mut node = self;
        for segment in path.segments() {
            node = match node {
                ConfigNode::Map(map) => map.get(segment)?,
                ConfigNode::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                ConfigNode::Scalar(_) => return None,
            };
        }
        Some(node)
    }

    /// Write `value` at `path`, creating missing intermediate maps.
    ///
    /// Errors are detected before anything is created, so a failed write
    /// leaves the tree untouched.
    pub fn set_path(&mut self, path: &ConfigPath, value: ConfigNode) -> Result<(), PathError> {
        let segments = path.segments();

        if path.is_append() {
            let (last, parents) = match segments.split_last() {
                Some(split) => split,
                None => return Err(PathError::NotAList { path: path.to_string() }),
            };
            let parent = descend_creating(self, parents, path)?;
            let target = child_or_insert(parent, last, path, parents.len(), || {
                ConfigNode::List(Vec::new())
            })?;
            return match target {
                ConfigNode::List(items) => {
                    items.push(value);
                    Ok(())
                }
                _ => Err(PathError::NotAList { path: path.to_string() }),
            };
        }

        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => {
                return match value {
                    ConfigNode::Map(_) => {
                        *self = value;
                        Ok(())
                    }
                    _ => Err(PathError::RootNotMap),
                };
            }
        };

        let parent = descend_creating(self, parents, path)?;
        match parent {
            ConfigNode::Map(map) => {
                map.insert(last.as_str(), value);
                Ok(())
            }
            ConfigNode::List(items) => {
                let index = list_index(last, path)?;
                if index < items.len() {
                    items[index] = value;
                    Ok(())
                } else if index == items.len() {
                    items.push(value);
                    Ok(())
                } else {
                    Err(PathError::IndexOutOfBounds {
                        path: path.to_string(),
                        index,
                        len: items.len(),
                    })
                }
            }
            ConfigNode::Scalar(_) => Err(PathError::NotAContainer {
                path: path.to_string(),
                at: path.prefix(parents.len()),
            }),
        }
    }

    /// Remove the node at `path`, returning it. Absent paths are a no-op.
    ///
    /// Removing a list element shifts the following elements down.
    pub fn remove_path(&mut self, path: &ConfigPath) -> Result<Option<ConfigNode>, PathError> {
        if path.is_append() {
            return Err(PathError::AppendNotAllowed { path: path.to_string() });
        }
        let (last, parents) = match path.segments().split_last() {
            Some(split) => split,
            None => return Err(PathError::RootNotRemovable),
        };

        let mut node = self;
        for segment in parents {
            let next = match node {
                ConfigNode::Map(map) => map.get_mut(segment),
                ConfigNode::List(items) => match segment.parse::<usize>() {
                    Ok(index) => items.get_mut(index),
                    Err(_) => None,
                },
                ConfigNode::Scalar(_) => None,
            };
            node = match next {
                Some(next) => next,
                None => return Ok(None),
            };
        }

        Ok(match node {
            ConfigNode::Map(map) => map.remove(last),
            ConfigNode::List(items) => match last.parse::<usize>() {
                Ok(index) if index < items.len() => Some(items.remove(index)),
                _ => None,
            },
            ConfigNode::Scalar(_) => None,
        })
    }
}

fn list_index(segment: &str, path: &ConfigPath) -> Result<usize, PathError> {
    segment.parse::<usize>().map_err(|_| PathError::InvalidIndex {
        path: path.to_string(),
        segment: segment.to_string(),
    })
}

fn descend_creating<'a>(
    root: &'a mut ConfigNode,
    segments: &[String],
    path: &ConfigPath,
) -> Result<&'a mut ConfigNode, PathError> {
    let mut node = root;
    for (depth, segment) in segments.iter().enumerate() {
        node = child_or_insert(node, segment, path, depth, ConfigNode::empty_map)?;
    }
    Ok(node)
}

/// Step from `node` into `segment`, inserting `make()` when the child is
/// missing. `depth` is the number of segments already consumed.
fn child_or_insert<'a>(
    node: &'a mut ConfigNode,
    segment: &str,
    path: &ConfigPath,
    depth: usize,
    make: impl FnOnce() -> ConfigNode,
) -> Result<&'a mut ConfigNode, PathError> {
    match node {
        ConfigNode::Map(map) => Ok(map.get_or_insert_with(segment, make)),
        ConfigNode::List(items) => {
            let index = list_index(segment, path)?;
            if index == items.len() {
                items.push(make());
            } else if index > items.len() {
                return Err(PathError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            Ok(&mut items[index])
        }
        ConfigNode::Scalar(_) => Err(PathError::NotAContainer {
            path: path.to_string(),
            at: path.prefix(depth),
        }),
    }
}

impl From<&str> for ConfigNode {
    fn from(value: &str) -> Self {
        ConfigNode::Scalar(Scalar::String(value.to_string()))
    }
}

impl From<String> for ConfigNode {
    fn from(value: String) -> Self {
        ConfigNode::Scalar(Scalar::String(value))
    }
}

impl From<i64> for ConfigNode {
    fn from(value: i64) -> Self {
        ConfigNode::Scalar(Scalar::Integer(value))
    }
}

impl From<f64> for ConfigNode {
    fn from(value: f64) -> Self {
        ConfigNode::Scalar(Scalar::Float(value))
    }
}

impl From<bool> for ConfigNode {
    fn from(value: bool) -> Self {
        ConfigNode::Scalar(Scalar::Bool(value))
    }
}

impl From<Vec<ConfigNode>> for ConfigNode {
    fn from(value: Vec<ConfigNode>) -> Self {
        ConfigNode::List(value)
    }
}

impl From<ConfigMap> for ConfigNode {
    fn from(value: ConfigMap) -> Self {
        ConfigNode::Map(value)
    }
}
