//! Collision Filtering (Category/Mask/Group)
//!
//! Bitmask-based collision filtering for controlling which fixtures can
//! interact.
//!
//! # Usage
//!
//! ```
//! use alice_physics2d::filter::Filter;
//!
//! const GROUND: u16 = 1 << 0;
//! const CRATE: u16 = 1 << 1;
//! const DEBRIS: u16 = 1 << 2;
//!
//! let crate_filter = Filter::new(CRATE, GROUND | CRATE);
//! let ground = Filter::new(GROUND, 0xFFFF);
//! let debris = Filter::new(DEBRIS, GROUND);
//!
//! assert!(Filter::should_collide(&crate_filter, &ground));
//! assert!(!Filter::should_collide(&crate_filter, &debris));
//! ```

use crate::fixture::Fixture;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Collision filter data of a fixture.
///
/// Two fixtures collide iff:
///   - they share a non-zero group: collide when the group is positive,
///     never when it is negative
///   - otherwise `(a.mask & b.category) != 0 && (a.category & b.mask) != 0`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Filter {
    /// Which category this fixture belongs to (usually one bit)
    pub category_bits: u16,
    /// Which categories this fixture accepts collisions with
    pub mask_bits: u16,
    /// Group override: same positive group always collides, same negative
    /// group never does, zero has no effect
    pub group_index: i16,
}

impl Filter {
    /// Default filter: category 1, collides with everything
    pub const DEFAULT: Self = Self {
        category_bits: 0x0001,
        mask_bits: 0xFFFF,
        group_index: 0,
    };

    /// Filter that collides with nothing
    pub const NONE: Self = Self {
        category_bits: 0,
        mask_bits: 0,
        group_index: 0,
    };

    /// Create a new filter
    #[inline]
    #[must_use]
    pub const fn new(category_bits: u16, mask_bits: u16) -> Self {
        Self {
            category_bits,
            mask_bits,
            group_index: 0,
        }
    }

    /// Create filter with a collision group
    #[inline]
    #[must_use]
    pub const fn with_group(mut self, group_index: i16) -> Self {
        self.group_index = group_index;
        self
    }

    /// Check if two filters allow collision
    #[inline]
    #[must_use]
    pub fn should_collide(a: &Self, b: &Self) -> bool {
        if a.group_index == b.group_index && a.group_index != 0 {
            return a.group_index > 0;
        }
        (a.mask_bits & b.category_bits) != 0 && (a.category_bits & b.mask_bits) != 0
    }
}

impl Default for Filter {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// User hook deciding whether two fixtures may create a contact.
///
/// Runs when the broad phase reports a new pair (after body and joint
/// checks) and again for existing contacts whose filters were refreshed.
pub trait ContactFilter {
    /// Return true if contact calculations should be performed between
    /// these two fixtures. The default applies [`Filter::should_collide`].
    fn should_collide(&self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        Filter::should_collide(fixture_a.filter(), fixture_b.filter())
    }
}

/// Filter that only applies the fixtures' [`Filter`] data.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultContactFilter;

impl ContactFilter for DefaultContactFilter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let a = Filter::DEFAULT;
        let b = Filter::default();
        assert!(Filter::should_collide(&a, &b));
    }

    #[test]
    fn test_none_filter() {
        assert!(!Filter::should_collide(&Filter::NONE, &Filter::DEFAULT));
    }

    #[test]
    fn test_category_mask() {
        let (ground, wheel, chassis) = (1 << 0, 1 << 1, 1 << 2);
        let wheel_filter = Filter::new(wheel, ground);
        let chassis_filter = Filter::new(chassis, ground);
        let ground_filter = Filter::new(ground, 0xFFFF);

        assert!(Filter::should_collide(&wheel_filter, &ground_filter));
        assert!(Filter::should_collide(&chassis_filter, &ground_filter));
        assert!(!Filter::should_collide(&wheel_filter, &chassis_filter));
    }

    #[test]
    fn test_one_way_mask() {
        // A accepts B, but B accepts nothing
        let a = Filter::new(1 << 0, 1 << 1);
        let b = Filter::new(1 << 1, 0);
        assert!(!Filter::should_collide(&a, &b));
        assert!(!Filter::should_collide(&b, &a));
    }

    #[test]
    fn test_positive_group_overrides_mask() {
        let a = Filter::new(1, 0).with_group(3);
        let b = Filter::new(2, 0).with_group(3);
        assert!(Filter::should_collide(&a, &b));
    }

    #[test]
    fn test_negative_group_never_collides() {
        let a = Filter::DEFAULT.with_group(-1);
        let b = Filter::DEFAULT.with_group(-1);
        let c = Filter::DEFAULT.with_group(-2);
        assert!(!Filter::should_collide(&a, &b));
        // Different groups fall back to the masks.
        assert!(Filter::should_collide(&a, &c));
    }
}
