//! Checkpoint Tree: hierarchical namespace of checkpoints and groups.
//!
//! Nodes are addressed by dotted paths (`farm.gold.lever`): every segment but
//! the last must name a group, and the last names the target node.
//! Identifiers are unique among siblings and children keep insertion order,
//! which is the order `list()` presents them in.
//!
//! The root is a bare child container with no identifier of its own.

mod children;

pub use children::Children;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::TreeError;
use crate::models::Checkpoint;

/// Tree shared between command handlers, the orchestrator and the gate.
pub type SharedTree = Arc<RwLock<CheckpointTree>>;

/// Wrap a tree for sharing across threads.
pub fn shared(tree: CheckpointTree) -> SharedTree {
    Arc::new(RwLock::new(tree))
}

/// A named container of further nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub children: Children,
}

/// Either a leaf checkpoint or a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Checkpoint(Checkpoint),
    Group(Group),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Checkpoint(_) => "checkpoint",
            Node::Group(_) => "group",
        }
    }
}

/// Parsed dotted path. The empty path denotes the root container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    pub fn parse(path: &str) -> Result<Self, TreeError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Ok(TreePath { segments: Vec::new() });
        }
        let segments = trimmed
            .split('.')
            .map(|segment| {
                validate_id(segment).map(|_| segment.to_string()).map_err(|_| {
                    TreeError::InvalidArgument(format!("malformed path '{}'", trimmed))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TreePath { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Dotted form of the first `len` segments.
    pub fn prefix(&self, len: usize) -> String {
        self.segments[..len.min(self.segments.len())].join(".")
    }

    fn require_node(path: &str) -> Result<Self, TreeError> {
        let parsed = Self::parse(path)?;
        if parsed.is_root() {
            return Err(TreeError::InvalidArgument("empty path".to_string()));
        }
        Ok(parsed)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Identifiers are non-empty, carry no surrounding whitespace and no dots.
pub fn validate_id(id: &str) -> Result<(), TreeError> {
    if id.is_empty() {
        return Err(TreeError::InvalidArgument("identifier must not be empty".to_string()));
    }
    if id.contains('.') {
        return Err(TreeError::InvalidArgument(format!("identifier '{}' contains '.'", id)));
    }
    if id.trim() != id {
        return Err(TreeError::InvalidArgument(format!(
            "identifier '{}' has surrounding whitespace",
            id
        )));
    }
    Ok(())
}

/// One row of a depth-first listing.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEntry<'a> {
    pub path: String,
    pub id: &'a str,
    pub depth: usize,
    pub node: &'a Node,
}

/// Root mapping from identifier to checkpoint or group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointTree {
    root: Children,
}

impl CheckpointTree {
    pub fn new() -> Self {
        CheckpointTree { root: Children::new() }
    }

    pub fn root(&self) -> &Children {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Walk `segments` as groups, returning the last group's children.
    fn descend(&self, path: &TreePath, depth: usize) -> Result<&Children, TreeError> {
        let mut current = &self.root;
        for (index, segment) in path.segments()[..depth].iter().enumerate() {
            current = match current.get(segment) {
                Some(Node::Group(group)) => &group.children,
                Some(Node::Checkpoint(_)) => {
                    return Err(TreeError::WrongType { path: path.prefix(index + 1), expected: "group" })
                }
                None => return Err(TreeError::NotFound(path.prefix(index + 1))),
            };
        }
        Ok(current)
    }

    fn descend_mut(&mut self, path: &TreePath, depth: usize) -> Result<&mut Children, TreeError> {
        let mut current = &mut self.root;
        for (index, segment) in path.segments()[..depth].iter().enumerate() {
            current = match current.get_mut(segment) {
                Some(Node::Group(group)) => &mut group.children,
                Some(Node::Checkpoint(_)) => {
                    return Err(TreeError::WrongType { path: path.prefix(index + 1), expected: "group" })
                }
                None => return Err(TreeError::NotFound(path.prefix(index + 1))),
            };
        }
        Ok(current)
    }

    /// Resolve `path` to a checkpoint.
    ///
    /// # Errors
    /// `NotFound` if any segment is absent, `WrongType` if an intermediate
    /// segment is a checkpoint or the final segment is a group.
    pub fn resolve_checkpoint(&self, path: &str) -> Result<&Checkpoint, TreeError> {
        let parsed = TreePath::require_node(path)?;
        let depth = parsed.segments().len() - 1;
        match self.descend(&parsed, depth)?.get(&parsed.segments()[depth]) {
            Some(Node::Checkpoint(checkpoint)) => Ok(checkpoint),
            Some(Node::Group(_)) => Err(TreeError::WrongType { path: parsed.to_string(), expected: "checkpoint" }),
            None => Err(TreeError::NotFound(parsed.to_string())),
        }
    }

    pub fn resolve_checkpoint_mut(&mut self, path: &str) -> Result<&mut Checkpoint, TreeError> {
        let parsed = TreePath::require_node(path)?;
        let depth = parsed.segments().len() - 1;
        let full = parsed.to_string();
        match self.descend_mut(&parsed, depth)?.get_mut(&parsed.segments()[depth]) {
            Some(Node::Checkpoint(checkpoint)) => Ok(checkpoint),
            Some(Node::Group(_)) => Err(TreeError::WrongType { path: full, expected: "checkpoint" }),
            None => Err(TreeError::NotFound(full)),
        }
    }

    /// Resolve `path` to a group; every segment must be a group.
    pub fn resolve_group(&self, path: &str) -> Result<&Group, TreeError> {
        let parsed = TreePath::require_node(path)?;
        let depth = parsed.segments().len() - 1;
        match self.descend(&parsed, depth)?.get(&parsed.segments()[depth]) {
            Some(Node::Group(group)) => Ok(group),
            Some(Node::Checkpoint(_)) => Err(TreeError::WrongType { path: parsed.to_string(), expected: "group" }),
            None => Err(TreeError::NotFound(parsed.to_string())),
        }
    }

    /// Insert `checkpoint` as the last child of the group at `parent_path`
    /// (the empty path is the root). Returns the new checkpoint's full path.
    ///
    /// The tree is left unchanged on any error.
    pub fn insert_checkpoint(
        &mut self,
        parent_path: &str,
        id: &str,
        checkpoint: Checkpoint,
    ) -> Result<String, TreeError> {
        validate_id(id)?;
        let parent = TreePath::parse(parent_path)?;
        let full = if parent.is_root() { id.to_string() } else { format!("{}.{}", parent, id) };
        let depth = parent.segments().len();
        let children = self.descend_mut(&parent, depth)?;
        if children.contains(id) {
            return Err(TreeError::AlreadyExists(full));
        }
        children.push(id.to_string(), Node::Checkpoint(checkpoint));
        log::debug!("[Tree] Inserted checkpoint {}", full);
        Ok(full)
    }

    /// Create every missing group along `path`. Existing group prefixes are
    /// reused; a `description`, if given, is set on the final group.
    ///
    /// Returns the number of groups created.
    pub fn insert_group(&mut self, path: &str, description: Option<String>) -> Result<usize, TreeError> {
        let parsed = TreePath::require_node(path)?;
        let last = parsed.segments().len() - 1;
        let mut created = 0;
        let mut current = &mut self.root;
        for (index, segment) in parsed.segments().iter().enumerate() {
            if !current.contains(segment) {
                current.push(segment.clone(), Node::Group(Group::default()));
                created += 1;
            }
            current = match current.get_mut(segment) {
                Some(Node::Group(group)) => {
                    if index == last && description.is_some() {
                        group.description = description.clone();
                    }
                    &mut group.children
                }
                Some(Node::Checkpoint(_)) => {
                    return Err(TreeError::WrongType { path: parsed.prefix(index + 1), expected: "group" })
                }
                None => return Err(TreeError::NotFound(parsed.prefix(index + 1))),
            };
        }
        if created > 0 {
            log::debug!("[Tree] Created {} group(s) for {}", created, parsed);
        }
        Ok(created)
    }

    /// Remove the node at `path` (a group goes with its whole subtree).
    ///
    /// Returns `Ok(false)` if nothing is there; errors only on a malformed path.
    pub fn delete(&mut self, path: &str) -> Result<bool, TreeError> {
        let parsed = TreePath::require_node(path)?;
        let depth = parsed.segments().len() - 1;
        let removed = match self.descend_mut(&parsed, depth) {
            Ok(children) => children.remove(&parsed.segments()[depth]).is_some(),
            Err(_) => false,
        };
        if removed {
            log::debug!("[Tree] Deleted {}", parsed);
        }
        Ok(removed)
    }

    /// Depth-first, insertion-ordered listing of every node.
    pub fn list(&self) -> Vec<TreeEntry<'_>> {
        let mut entries = Vec::new();
        Self::walk(&self.root, "", 0, &mut entries);
        entries
    }

    fn walk<'a>(children: &'a Children, prefix: &str, depth: usize, out: &mut Vec<TreeEntry<'a>>) {
        for (id, node) in children.iter() {
            let path = if prefix.is_empty() { id.to_string() } else { format!("{}.{}", prefix, id) };
            out.push(TreeEntry { path: path.clone(), id, depth, node });
            if let Node::Group(group) = node {
                Self::walk(&group.children, &path, depth + 1, out);
            }
        }
    }

    /// Every checkpoint with its path, in listing order.
    pub fn checkpoints(&self) -> Vec<(String, Checkpoint)> {
        self.list()
            .into_iter()
            .filter_map(|entry| match entry.node {
                Node::Checkpoint(checkpoint) => Some((entry.path, checkpoint.clone())),
                Node::Group(_) => None,
            })
            .collect()
    }

    pub fn checkpoint_count(&self) -> usize {
        self.list()
            .iter()
            .filter(|entry| matches!(entry.node, Node::Checkpoint(_)))
            .count()
    }
}
