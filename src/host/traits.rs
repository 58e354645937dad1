//! Collaborator traits consumed by the resolution core.
//!
//! Implementations must be usable from multiple threads at once: queries are
//! read-only and may run concurrently.

use serde::{Deserialize, Serialize};

use crate::filter::WorldContext;
use crate::form::{FormId, FormKind};
use crate::transform::Vec3;

/// Spatial state of a placed object. Rotation is in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// World position.
    pub position: Vec3,
    /// Euler angles in radians.
    pub rotation: Vec3,
    /// Uniform scale.
    pub scale: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

/// A world object instance as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Instance identity; also the seed for per-object randomization.
    pub id: FormId,
    /// Template the instance was spawned from.
    pub base: FormId,
    /// True for references created at runtime (no persistent placement).
    pub created: bool,
    /// Current placement.
    pub placement: Placement,
    /// Record flag bits; property overrides may set extra bits.
    pub flags: u32,
}

impl ObjectRef {
    /// A persistent, placed reference with a default placement.
    #[must_use]
    pub fn placed(id: FormId, base: FormId) -> Self {
        Self {
            id,
            base,
            created: false,
            placement: Placement::default(),
            flags: 0,
        }
    }

    /// A reference spawned at runtime.
    #[must_use]
    pub fn created(id: FormId, base: FormId) -> Self {
        Self {
            created: true,
            ..Self::placed(id, base)
        }
    }

    /// Sets the placement.
    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }
}

/// Identifier resolution service.
pub trait FormResolver: Send + Sync {
    /// Looks a form up by editor id.
    fn lookup_editor_id(&self, editor_id: &str) -> Option<FormId>;

    /// Looks up a form defined by `source` at the source-relative id `local`.
    fn lookup_in_source(&self, local: u32, source: &str) -> Option<FormId>;

    /// Returns the kind of a loaded form, or `None` if the id is unknown.
    fn kind_of(&self, id: FormId) -> Option<FormKind>;
}

/// Context snapshot provider.
pub trait WorldContextProvider: Send + Sync {
    /// Captures location, region, cell and keyword membership for `reference`.
    fn snapshot(&self, reference: &ObjectRef, base: FormId) -> WorldContext;
}

/// Randomized-list expansion service.
pub trait LeveledListEvaluator: Send + Sync {
    /// Picks the concrete form `list` yields for `reference`.
    fn evaluate(&self, list: FormId, reference: &ObjectRef) -> Option<FormId>;
}
