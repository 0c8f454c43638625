//! Chain Shape
//!
//! A free-form sequence of line segments, either open or closed into a loop.
//! Every segment is exposed as a one-sided child edge whose ghost vertices
//! come from its neighbours, which lets objects slide across the joints
//! between segments without catching on internal corners.

use crate::collision::{Aabb, RayCastInput, RayCastOutput};
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{Transform, Vec2};
use crate::settings::LINEAR_SLOP;
use crate::shape::EdgeShape;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Chain of connected edges.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChainShape {
    vertices: Vec<Vec2>,
    prev_vertex: Vec2,
    next_vertex: Vec2,
}

fn check_vertices(vertices: &[Vec2]) -> PhysicsResult<()> {
    if vertices.iter().any(|v| !v.is_valid()) {
        return Err(PhysicsError::InvalidShape {
            reason: "chain vertices must be finite",
        });
    }
    for pair in vertices.windows(2) {
        if pair[0].distance_squared(pair[1]) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(PhysicsError::InvalidShape {
                reason: "chain vertices are too close together",
            });
        }
    }
    Ok(())
}

impl ChainShape {
    /// Closed loop through `vertices`. The last vertex connects back to the
    /// first.
    pub fn new_loop(vertices: &[Vec2]) -> PhysicsResult<Self> {
        if vertices.len() < 3 {
            return Err(PhysicsError::InvalidShape {
                reason: "chain loop needs at least 3 vertices",
            });
        }
        check_vertices(vertices)?;

        let mut closed = Vec::with_capacity(vertices.len() + 1);
        closed.extend_from_slice(vertices);
        closed.push(vertices[0]);
        check_vertices(&closed[closed.len() - 2..])?;

        let prev_vertex = closed[closed.len() - 2];
        let next_vertex = closed[1];
        Ok(Self {
            vertices: closed,
            prev_vertex,
            next_vertex,
        })
    }

    /// Open chain through `vertices` with ghost vertices before the first
    /// and after the last point.
    pub fn new_chain(vertices: &[Vec2], prev_vertex: Vec2, next_vertex: Vec2) -> PhysicsResult<Self> {
        if vertices.len() < 2 {
            return Err(PhysicsError::InvalidShape {
                reason: "chain needs at least 2 vertices",
            });
        }
        check_vertices(vertices)?;
        if !prev_vertex.is_valid() || !next_vertex.is_valid() {
            return Err(PhysicsError::InvalidShape {
                reason: "chain ghost vertices must be finite",
            });
        }
        Ok(Self {
            vertices: vertices.to_vec(),
            prev_vertex,
            next_vertex,
        })
    }

    /// Chain vertices. For a loop the first vertex is repeated at the end.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// One child per edge.
    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// One-sided edge for child `index`, with ghost vertices taken from the
    /// neighbouring segments.
    #[must_use]
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        debug_assert!(index < self.child_count());
        let vs = &self.vertices;
        EdgeShape {
            vertex0: if index > 0 { vs[index - 1] } else { self.prev_vertex },
            vertex1: vs[index],
            vertex2: vs[index + 1],
            vertex3: if index + 2 < vs.len() {
                vs[index + 2]
            } else {
                self.next_vertex
            },
            one_sided: true,
        }
    }

    /// Ray casts hit either side of a chain segment.
    pub(crate) fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        index: usize,
    ) -> Option<RayCastOutput> {
        let edge = EdgeShape {
            one_sided: false,
            ..self.child_edge(index)
        };
        edge.ray_cast(input, xf)
    }

    pub(crate) fn compute_aabb(&self, xf: &Transform, index: usize) -> Aabb {
        self.child_edge(index).compute_aabb(xf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_loop_children_wrap_around() {
        let chain = ChainShape::new_loop(&square()).unwrap();
        assert_eq!(chain.child_count(), 4);
        let first = chain.child_edge(0);
        assert_eq!(first.vertex0, Vec2::new(0.0, 1.0));
        let last = chain.child_edge(3);
        assert_eq!(last.vertex2, Vec2::new(0.0, 0.0));
        assert_eq!(last.vertex3, Vec2::new(1.0, 0.0));
        assert!(last.one_sided);
    }

    #[test]
    fn test_open_chain_uses_ghosts() {
        let prev = Vec2::new(-1.0, 0.0);
        let next = Vec2::new(5.0, 0.0);
        let chain = ChainShape::new_chain(
            &[Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(4.0, 0.0)],
            prev,
            next,
        )
        .unwrap();
        assert_eq!(chain.child_count(), 2);
        assert_eq!(chain.child_edge(0).vertex0, prev);
        assert_eq!(chain.child_edge(1).vertex3, next);
    }

    #[test]
    fn test_chain_rejects_bad_input() {
        assert!(ChainShape::new_loop(&square()[..2]).is_err());
        assert!(ChainShape::new_chain(&[Vec2::ZERO], Vec2::ZERO, Vec2::ZERO).is_err());
        let duplicate = [Vec2::ZERO, Vec2::ZERO, Vec2::UNIT_X];
        assert!(ChainShape::new_chain(&duplicate, Vec2::ZERO, Vec2::ZERO).is_err());
    }
}
