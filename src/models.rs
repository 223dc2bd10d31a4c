//! Core data types for Backup Gate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ProbeError;

/// World partition a checkpoint lives in and a query is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Realm {
    #[default]
    Overworld,
    TheNether,
    TheEnd,
}

impl Realm {
    /// All realm tags, in the order they are presented to operators.
    pub const ALL: [Realm; 3] = [Realm::Overworld, Realm::TheNether, Realm::TheEnd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Realm::Overworld => "overworld",
            Realm::TheNether => "the_nether",
            Realm::TheEnd => "the_end",
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Realm {
    type Err = ProbeError;

    /// Accepts the bare tag or the namespaced `minecraft:` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        let tag = tag.strip_prefix("minecraft:").unwrap_or(tag);
        Realm::ALL
            .into_iter()
            .find(|realm| realm.as_str() == tag)
            .ok_or_else(|| ProbeError::InvalidArgument(s.to_string()))
    }
}

/// Integer block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coords {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coords {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Coords { x, y, z }
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Block type plus its attribute mapping, as reported by the server.
///
/// Attributes compare by full equality; key order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockState {
    pub block: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(block: impl Into<String>) -> Self {
        BlockState { block: block.into(), attributes: BTreeMap::new() }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// `key=value` pairs joined by commas, for display.
    pub fn attributes_display(&self) -> String {
        if self.attributes.is_empty() {
            return "-".to_string();
        }
        self.attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.block, self.attributes_display())
    }
}

/// A located expectation of a block's "off" state.
///
/// The identifier is the key under which the checkpoint is stored in its
/// parent group, so it is not repeated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    #[serde(default)]
    pub world: Realm,
    pub block: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Checkpoint {
    pub fn new(coords: Coords, world: Realm, expected: BlockState) -> Self {
        Checkpoint {
            x: coords.x,
            y: coords.y,
            z: coords.z,
            world,
            block: expected.block,
            data: expected.attributes,
        }
    }

    pub fn coords(&self) -> Coords {
        Coords::new(self.x, self.y, self.z)
    }

    pub fn expected(&self) -> BlockState {
        BlockState { block: self.block.clone(), attributes: self.data.clone() }
    }

    /// Overwrite the expected state, keeping position and realm.
    pub fn set_expected(&mut self, observed: BlockState) {
        self.block = observed.block;
        self.data = observed.attributes;
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}]",
            self.world,
            self.coords(),
            self.block,
            self.expected().attributes_display()
        )
    }
}
