//! Physics Error Types
//!
//! Unified error type for the engine. Creation and destruction calls that can
//! be rejected return `PhysicsResult<T>`; geometric degeneracies met while
//! stepping are handled locally and never surface here.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

/// Result alias used by every fallible world operation.
pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// Unified error type for physics operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PhysicsError {
    /// A shape definition failed validation (radius, vertex count, convexity).
    #[error("invalid shape: {reason}")]
    InvalidShape {
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// A handle refers to an entity that was destroyed or never existed.
    #[error("stale or unknown {kind} handle")]
    InvalidHandle {
        /// Entity kind ("body", "fixture", "joint", "contact")
        kind: &'static str,
    },
    /// A body still has joints attached and cannot be destroyed.
    #[error("body still has {count} joint(s) attached; destroy them first")]
    BodyHasJoints {
        /// Number of joints still referencing the body
        count: usize,
    },
    /// A joint definition is inconsistent.
    #[error("invalid joint: {reason}")]
    InvalidJoint {
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// A joint cannot be destroyed because another joint depends on it.
    #[error("joint in use: {reason}")]
    JointInUse {
        /// Human-readable description of the dependency
        reason: &'static str,
    },
    /// Invalid configuration parameter.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the invalid configuration
        reason: &'static str,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = PhysicsError::BodyHasJoints { count: 3 };
        let s = format!("{}", e);
        assert!(s.contains('3'), "Should contain count");
        assert!(s.contains("joint"));
    }

    #[test]
    fn test_error_debug() {
        let e = PhysicsError::InvalidHandle { kind: "body" };
        let s = format!("{:?}", e);
        assert!(s.contains("InvalidHandle"));
    }

    #[test]
    fn test_error_variants() {
        let e1 = PhysicsError::InvalidShape {
            reason: "radius must be positive",
        };
        let e2 = PhysicsError::InvalidJoint {
            reason: "body A == body B",
        };
        assert_ne!(e1, e2);
        assert!(e1.to_string().contains("radius"));
    }

    #[test]
    fn test_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&PhysicsError::JointInUse {
            reason: "gear joint",
        });
    }
}
