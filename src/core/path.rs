// ============================================================================
// Path Model
// ============================================================================
//
// A Path addresses a mutated leaf inside a record: the steps walked from the
// record root, each tagged with the kind of container found at that step,
// followed by the bare leaf segment that was written.
//
//   record.states.flags[2] = true
//     steps: [(Attribute("states"), Map), (Key("flags"), Sequence)]
//     leaf:  Index(2)
//
// ============================================================================

use std::fmt;

use crate::core::reserved::is_reserved;

/// Kind of container a path step descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Map,
    Sequence,
}

impl ContainerKind {
    /// Empty wire container of this kind.
    pub fn empty_wire(self) -> serde_json::Value {
        match self {
            Self::Map => serde_json::Value::Object(serde_json::Map::new()),
            Self::Sequence => serde_json::Value::Array(Vec::new()),
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map => write!(f, "map"),
            Self::Sequence => write!(f, "sequence"),
        }
    }
}

/// One addressing step: a record/object attribute, a map key, or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Attribute(String),
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }

    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }

    /// Attribute or key name; `None` for an index.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Attribute(name) | Self::Key(name) => Some(name),
            Self::Index(_) => None,
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.name().is_some_and(is_reserved)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(name) => write!(f, "{}", name),
            Self::Key(key) => write!(f, "[{:?}]", key),
            Self::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// A segment together with the kind of container stored under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub segment: Segment,
    pub kind: ContainerKind,
}

/// Route from a record root to a mutated leaf. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    steps: Vec<PathStep>,
    leaf: Segment,
}

impl Path {
    /// Minimal path: a single segment written directly.
    pub fn leaf(segment: Segment) -> Self {
        Self {
            steps: Vec::new(),
            leaf: segment,
        }
    }

    /// Prepends `(segment, kind)`; used while a notification travels upward.
    pub fn extend(mut self, kind: ContainerKind, segment: Segment) -> Self {
        self.steps.insert(0, PathStep { segment, kind });
        self
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn leaf_segment(&self) -> &Segment {
        &self.leaf
    }

    /// Number of segments including the leaf.
    pub fn depth(&self) -> usize {
        self.steps.len() + 1
    }

    pub fn root_segment(&self) -> &Segment {
        self.steps
            .first()
            .map(|step| &step.segment)
            .unwrap_or(&self.leaf)
    }

    pub fn root_name(&self) -> Option<&str> {
        self.root_segment().name()
    }

    /// True when any segment on the route is a reserved metadata name.
    pub fn touches_reserved(&self) -> bool {
        self.leaf.is_reserved() || self.steps.iter().any(|step| step.segment.is_reserved())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segments = self
            .steps
            .iter()
            .map(|step| &step.segment)
            .chain(std::iter::once(&self.leaf));
        for (position, segment) in segments.enumerate() {
            match segment {
                Segment::Attribute(name) if position > 0 => write!(f, ".{}", name)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}
