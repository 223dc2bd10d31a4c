//! Insertion-ordered child container.
//!
//! Children are written to JSON as an object whose key order is the
//! insertion order. serde_json hands map entries to the visitor in document
//! order, so reading the object back restores the same order without an
//! ordered-map dependency.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{validate_id, Node};

/// Ordered mapping from child identifier to node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Children(Vec<(String, Node)>);

impl Children {
    pub fn new() -> Self {
        Children(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|(key, _)| key == id)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.0.iter().find(|(key, _)| key == id).map(|(_, node)| node)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.0.iter_mut().find(|(key, _)| key == id).map(|(_, node)| node)
    }

    /// Append as the last child. Callers check uniqueness first.
    pub(crate) fn push(&mut self, id: String, node: Node) {
        debug_assert!(!self.contains(&id), "duplicate sibling id {}", id);
        self.0.push((id, node));
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Node> {
        let index = self.0.iter().position(|(key, _)| key == id)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.0.iter().map(|(key, node)| (key.as_str(), node))
    }
}

impl Serialize for Children {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, node) in &self.0 {
            map.serialize_entry(id, node)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Children {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ChildrenVisitor;

        impl<'de> Visitor<'de> for ChildrenVisitor {
            type Value = Children;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of checkpoint/group nodes")
            }

            fn visit_map<M>(self, mut access: M) -> Result<Children, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut children = Children(Vec::with_capacity(access.size_hint().unwrap_or(0)));
                while let Some((id, node)) = access.next_entry::<String, Node>()? {
                    validate_id(&id).map_err(de::Error::custom)?;
                    if children.contains(&id) {
                        return Err(de::Error::custom(format!("duplicate sibling id '{}'", id)));
                    }
                    children.0.push((id, node));
                }
                Ok(children)
            }
        }

        deserializer.deserialize_map(ChildrenVisitor)
    }
}
