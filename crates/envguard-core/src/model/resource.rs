use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

text_enum! {
    /// Kinds of bookable resource, from the widest to the narrowest.
    pub enum ResourceKind {
        /// A whole environment; implicitly covers all of its instances.
        Environment => "Environment",
        EnvironmentInstance => "EnvironmentInstance",
        InfraComponent => "InfraComponent",
    }
    unknown = Error::UnknownResourceType;
}

text_enum! {
    /// Occupancy of a single infrastructure component.
    pub enum ComponentStatus {
        Available => "Available",
        Reserved => "Reserved",
        InUse => "InUse",
    }
    unknown = |value| Error::UnknownStatus { kind: "component status", value };
}

text_enum! {
    /// Occupancy of an environment instance, folded from its components.
    pub enum InstanceBookingStatus {
        Available => "Available",
        PartiallyBooked => "PartiallyBooked",
        FullyBooked => "FullyBooked",
    }
    unknown = |value| Error::UnknownStatus { kind: "instance booking status", value };
}

/// A typed reference to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub id: String,
}

impl PartialOrd for ResourceKind {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceKind {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.depth().cmp(&other.depth())
    }
}

impl ResourceKind {
    /// 0 for environments, growing towards components.
    pub const fn depth(self) -> u8 {
        match self {
            Self::Environment => 0,
            Self::EnvironmentInstance => 1,
            Self::InfraComponent => 2,
        }
    }
}

/// Parent/child lookups over the resource tree.
///
/// Implemented by the store; anything that can answer these two questions can
/// drive scope expansion.
pub trait ResourceHierarchy {
    /// Direct children of `resource`.
    fn children(&self, resource: &ResourceRef) -> Result<Vec<ResourceRef>>;

    /// Direct parent of `resource`, if it has one.
    fn parent(&self, resource: &ResourceRef) -> Result<Option<ResourceRef>>;
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn environment(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::Environment, id)
    }

    pub fn instance(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::EnvironmentInstance, id)
    }

    pub fn component(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::InfraComponent, id)
    }

    /// Every resource below this one, depth first.
    pub fn contained_resources(&self, tree: &impl ResourceHierarchy) -> Result<Vec<Self>> {
        let mut out = Vec::new();
        let mut pending = tree.children(self)?;
        while let Some(next) = pending.pop() {
            pending.extend(tree.children(&next)?);
            out.push(next);
        }
        Ok(out)
    }

    /// Every resource above this one, nearest first.
    pub fn ancestors(&self, tree: &impl ResourceHierarchy) -> Result<Vec<Self>> {
        let mut out = Vec::new();
        let mut current = tree.parent(self)?;
        while let Some(parent) = current {
            current = tree.parent(&parent)?;
            out.push(parent);
        }
        Ok(out)
    }

    /// The resource itself, its ancestors and everything it contains.
    ///
    /// A booking or refresh on any member of this set shares time with one
    /// on `self`: booking an environment occupies its instances, and
    /// refreshing an instance disrupts whoever booked its environment.
    pub fn affected_scope(&self, tree: &impl ResourceHierarchy) -> Result<Vec<Self>> {
        let mut scope = vec![self.clone()];
        scope.extend(self.ancestors(tree)?);
        scope.extend(self.contained_resources(tree)?);
        scope.sort();
        scope.dedup();
        Ok(scope)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Parses the `Kind/id` form produced by `Display`.
impl std::str::FromStr for ResourceRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidInput(format!("expected Kind/id, got '{s}'")))?;
        if id.is_empty() {
            return Err(Error::InvalidInput(format!("missing resource id in '{s}'")));
        }
        Ok(Self::new(kind.parse()?, id))
    }
}
