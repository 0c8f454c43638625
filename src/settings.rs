//! Engine Tuning Constants and World Configuration
//!
//! Units are meters-kilograms-seconds. Shapes should be roughly 0.1 to 10
//! meters; the slops and margins below are chosen for that range.

use crate::error::{PhysicsError, PhysicsResult};
use crate::math::Vec2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const PI: f32 = core::f32::consts::PI;

// ============================================================================
// Collision
// ============================================================================

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Fattening applied to broad-phase AABBs so proxies can move without
/// restructuring the tree.
pub const AABB_EXTENSION: f32 = 0.1;

/// Scale of the displacement-predicted AABB extension.
pub const AABB_MULTIPLIER: f32 = 4.0;

/// Collision and constraint tolerance.
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular collision and constraint tolerance.
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * PI;

/// Skin radius around polygons and edges; keeps polygons slightly apart so
/// the distance algorithm keeps working.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// Maximum number of sub-steps per contact in continuous physics.
pub const MAX_SUB_STEPS: usize = 8;

// ============================================================================
// Dynamics
// ============================================================================

/// Maximum number of contacts handled by a TOI mini island.
pub const MAX_TOI_CONTACTS: usize = 32;

/// Maximum linear position correction per position iteration.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Maximum angular position correction per position iteration.
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * PI;

/// Maximum linear translation of a body per step.
pub const MAX_TRANSLATION: f32 = 2.0;

/// Square of [`MAX_TRANSLATION`].
pub const MAX_TRANSLATION_SQUARED: f32 = MAX_TRANSLATION * MAX_TRANSLATION;

/// Maximum rotation of a body per step.
pub const MAX_ROTATION: f32 = 0.5 * PI;

/// Square of [`MAX_ROTATION`].
pub const MAX_ROTATION_SQUARED: f32 = MAX_ROTATION * MAX_ROTATION;

/// Fraction of overlap resolved per position iteration.
pub const BAUMGARTE: f32 = 0.2;

/// Overlap resolution fraction used by TOI sub-steps.
pub const TOI_BAUMGARTE: f32 = 0.75;

/// Relative approach speed above which restitution is applied (m/s).
pub const DEFAULT_RESTITUTION_THRESHOLD: f32 = 1.0;

// ============================================================================
// Sleep
// ============================================================================

/// Time a body must be still before it sleeps (seconds).
pub const TIME_TO_SLEEP: f32 = 0.5;

/// Linear speed below which a body counts as still (m/s).
pub const LINEAR_SLEEP_TOLERANCE: f32 = 0.01;

/// Angular speed below which a body counts as still (rad/s).
pub const ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * PI;

// ============================================================================
// Material mixing
// ============================================================================

/// Friction mixing: geometric mean, so a zero-friction surface is slippery
/// against anything.
#[inline]
#[must_use]
pub fn mix_friction(friction_a: f32, friction_b: f32) -> f32 {
    (friction_a * friction_b).sqrt()
}

/// Restitution mixing: the bouncier surface wins.
#[inline]
#[must_use]
pub fn mix_restitution(restitution_a: f32, restitution_b: f32) -> f32 {
    restitution_a.max(restitution_b)
}

/// Restitution threshold mixing: the lower threshold wins.
#[inline]
#[must_use]
pub fn mix_restitution_threshold(threshold_a: f32, threshold_b: f32) -> f32 {
    threshold_a.min(threshold_b)
}

// ============================================================================
// WorldConfig
// ============================================================================

/// World-wide simulation settings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldConfig {
    /// Gravitational acceleration.
    pub gravity: Vec2,
    /// Allow islands to fall asleep.
    pub allow_sleep: bool,
    /// Seed the solver with last step's impulses.
    pub warm_starting: bool,
    /// Run time-of-impact sweeps after the discrete solve.
    pub continuous_physics: bool,
    /// Handle only one TOI event per step (debugging aid).
    pub sub_stepping: bool,
    /// Velocity iterations used by [`crate::World::step_default`].
    pub velocity_iterations: u32,
    /// Position iterations used by [`crate::World::step_default`].
    pub position_iterations: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -10.0),
            allow_sleep: true,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            velocity_iterations: 8,
            position_iterations: 3,
        }
    }
}

impl WorldConfig {
    /// Set gravity.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    /// Enable or disable sleeping.
    #[must_use]
    pub fn with_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    /// Enable or disable warm starting.
    #[must_use]
    pub fn with_warm_starting(mut self, warm_starting: bool) -> Self {
        self.warm_starting = warm_starting;
        self
    }

    /// Enable or disable continuous collision.
    #[must_use]
    pub fn with_continuous_physics(mut self, continuous: bool) -> Self {
        self.continuous_physics = continuous;
        self
    }

    /// Set default iteration counts.
    #[must_use]
    pub fn with_iterations(mut self, velocity: u32, position: u32) -> Self {
        self.velocity_iterations = velocity;
        self.position_iterations = position;
        self
    }

    /// Reject non-finite gravity.
    pub fn validate(&self) -> PhysicsResult<()> {
        if !self.gravity.is_valid() {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "gravity must be finite",
            });
        }
        Ok(())
    }
}
