//! Time Step and Solver State Buffers
//!
//! Per-step parameters shared by the island solver, the contact solver and
//! the joints, plus the island-local position/velocity arrays they operate on.

use crate::math::Vec2;

/// Parameters of one (sub-)step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeStep {
    /// Time step in seconds
    pub dt: f32,
    /// Inverse time step (0 if dt == 0)
    pub inv_dt: f32,
    /// `dt * inv_dt0`, scales warm-start impulses when dt changes
    pub dt_ratio: f32,
    /// Velocity iterations
    pub velocity_iterations: u32,
    /// Position iterations
    pub position_iterations: u32,
    /// Scale accumulated impulses from the previous step
    pub warm_starting: bool,
}

/// Island-local position state: center of mass and angle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    /// World center of mass
    pub c: Vec2,
    /// Angle in radians
    pub a: f32,
}

/// Island-local velocity state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// Linear velocity of the center of mass
    pub v: Vec2,
    /// Angular velocity
    pub w: f32,
}

/// State handed to joint solvers.
#[derive(Debug)]
pub struct SolverData<'a> {
    /// Step parameters
    pub step: TimeStep,
    /// Positions indexed by island index
    pub positions: &'a mut [Position],
    /// Velocities indexed by island index
    pub velocities: &'a mut [Velocity],
}

/// Wall-clock cost of the last step's stages, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Profile {
    /// Whole step
    pub step: f32,
    /// Narrow phase contact update
    pub collide: f32,
    /// Discrete island solve (sum over islands)
    pub solve: f32,
    /// Solver setup
    pub solve_init: f32,
    /// Velocity iterations
    pub solve_velocity: f32,
    /// Position iterations
    pub solve_position: f32,
    /// Broad phase pair update
    pub broadphase: f32,
    /// Continuous collision
    pub solve_toi: f32,
}

/// Milliseconds elapsed since `start`.
#[inline]
pub(crate) fn elapsed_ms(start: std::time::Instant) -> f32 {
    start.elapsed().as_secs_f32() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_data_borrows_buffers() {
        let mut positions = vec![Position::default(); 2];
        let mut velocities = vec![Velocity::default(); 2];
        {
            let data = SolverData {
                step: TimeStep {
                    dt: 1.0 / 60.0,
                    inv_dt: 60.0,
                    dt_ratio: 1.0,
                    velocity_iterations: 8,
                    position_iterations: 3,
                    warm_starting: true,
                },
                positions: &mut positions,
                velocities: &mut velocities,
            };
            data.velocities[1].v = Vec2::new(1.0, 2.0);
            data.positions[0].a = 0.5;
        }
        assert_eq!(velocities[1].v, Vec2::new(1.0, 2.0));
        assert_eq!(positions[0].a, 0.5);
    }

    #[test]
    fn test_elapsed_is_non_negative() {
        let start = std::time::Instant::now();
        assert!(elapsed_ms(start) >= 0.0);
    }
}
