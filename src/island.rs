//! Islands
//!
//! An island is a set of bodies connected through touching contacts and
//! joints. Islands are solved independently; a whole island falls asleep
//! once every body in it has stayed below the sleep tolerances for
//! [`TIME_TO_SLEEP`] seconds.
//!
//! # Solve order
//!
//! ```text
//!   integrate forces ─► warm start ─► velocity iterations (joints, contacts)
//!        ─► integrate positions ─► position iterations ─► write back
//!        ─► post-solve reports ─► sleep check
//! ```
//!
//! Islands are built by the world with a depth-first flood fill; this module
//! only solves them.

use std::time::Instant;

use tracing::debug;

use crate::arena::{Arena, BodyId, ContactId, JointId};
use crate::body::{Body, BodyType};
use crate::contact::Contact;
use crate::contact_solver::ContactSolver;
use crate::event::Listeners;
use crate::joint::Joint;
use crate::math::Vec2;
use crate::settings::{
    ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, MAX_ROTATION, MAX_ROTATION_SQUARED,
    MAX_TRANSLATION, MAX_TRANSLATION_SQUARED, TIME_TO_SLEEP,
};
use crate::step::{elapsed_ms, Position, Profile, SolverData, TimeStep, Velocity};

/// Mutable world state an island solve works on.
pub(crate) struct IslandWorld<'a> {
    pub bodies: &'a mut Arena<BodyId, Body>,
    pub contacts: &'a mut Arena<ContactId, Contact>,
    pub joints: &'a mut Arena<JointId, Joint>,
    pub listeners: &'a mut Listeners,
}

/// Bodies, contacts and joints of one island plus its solver buffers.
#[derive(Debug, Default)]
pub(crate) struct Island {
    pub bodies: Vec<BodyId>,
    pub contacts: Vec<ContactId>,
    pub joints: Vec<JointId>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl Island {
    /// Empty the island, keeping allocations.
    pub(crate) fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    /// Add a body and record its island index on it.
    pub(crate) fn add_body(&mut self, id: BodyId, body: &mut Body) {
        body.island_index = self.bodies.len();
        self.bodies.push(id);
    }

    pub(crate) fn add_contact(&mut self, id: ContactId) {
        self.contacts.push(id);
    }

    pub(crate) fn add_joint(&mut self, id: JointId) {
        self.joints.push(id);
    }

    /// Copy body state into the solver buffers.
    fn load(&mut self, bodies: &Arena<BodyId, Body>) {
        self.positions.clear();
        self.velocities.clear();
        for &id in &self.bodies {
            let body = &bodies[id];
            self.positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(Velocity {
                v: body.linear_velocity,
                w: body.angular_velocity,
            });
        }
    }

    /// Integrate positions with the per-step translation and rotation caps.
    fn integrate_positions(&mut self, h: f32) {
        for (p, v) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
            let translation = v.v * h;
            if translation.dot(translation) > MAX_TRANSLATION_SQUARED {
                let ratio = MAX_TRANSLATION / translation.length();
                v.v *= ratio;
            }

            let rotation = h * v.w;
            if rotation * rotation > MAX_ROTATION_SQUARED {
                let ratio = MAX_ROTATION / rotation.abs();
                v.w *= ratio;
            }

            p.c += v.v * h;
            p.a += h * v.w;
        }
    }

    /// Copy the solver buffers back into the bodies.
    fn store(&self, bodies: &mut Arena<BodyId, Body>) {
        for (i, &id) in self.bodies.iter().enumerate() {
            let body = &mut bodies[id];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }
    }

    fn report(solver: &ContactSolver, contacts: &Arena<ContactId, Contact>, listeners: &mut Listeners) {
        if listeners.contact.is_none() {
            return;
        }
        for (id, impulse) in solver.impulses() {
            if let Some(contact) = contacts.get(id) {
                listeners.post_solve(id, contact, &impulse);
            }
        }
    }

    /// Solve one island for a full step.
    pub(crate) fn solve(
        &mut self,
        step: &TimeStep,
        gravity: Vec2,
        allow_sleep: bool,
        world: IslandWorld<'_>,
        profile: &mut Profile,
    ) {
        let IslandWorld {
            bodies,
            contacts,
            joints,
            listeners,
        } = world;
        let h = step.dt;

        // Integrate velocities and apply damping. Initialize the body state.
        self.positions.clear();
        self.velocities.clear();
        for &id in &self.bodies {
            let b = &mut bodies[id];
            let c = b.sweep.c;
            let a = b.sweep.a;
            let mut v = b.linear_velocity;
            let mut w = b.angular_velocity;

            // Store positions for continuous collision.
            b.sweep.c0 = c;
            b.sweep.a0 = a;

            if b.body_type == BodyType::Dynamic {
                v += (gravity * (b.gravity_scale * b.mass) + b.force) * (h * b.inv_mass);
                w += h * b.inv_i * b.torque;

                // Pade approximation of the damping ODE:
                // v2 = v1 * 1 / (1 + c * dt), stable for large c * dt.
                v *= 1.0 / (1.0 + h * b.linear_damping);
                w *= 1.0 / (1.0 + h * b.angular_damping);
            }

            self.positions.push(Position { c, a });
            self.velocities.push(Velocity { v, w });
        }

        let timer = Instant::now();

        let mut contact_solver = ContactSolver::new(*step, &self.contacts, contacts, bodies);
        contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);
        if step.warm_starting {
            contact_solver.warm_start(&mut self.velocities);
        }

        let mut data = SolverData {
            step: *step,
            positions: &mut self.positions,
            velocities: &mut self.velocities,
        };

        for &id in &self.joints {
            joints[id].init_velocity_constraints(&mut data, bodies);
        }
        profile.solve_init += elapsed_ms(timer);

        // Solve velocity constraints.
        let timer = Instant::now();
        for _ in 0..step.velocity_iterations {
            for &id in &self.joints {
                joints[id].solve_velocity_constraints(&mut data);
            }
            contact_solver.solve_velocity_constraints(data.velocities);
        }

        // Store impulses for warm starting.
        contact_solver.store_impulses(contacts);
        profile.solve_velocity += elapsed_ms(timer);

        self.integrate_positions(h);

        // Solve position constraints.
        let timer = Instant::now();
        let mut position_solved = false;
        let mut data = SolverData {
            step: *step,
            positions: &mut self.positions,
            velocities: &mut self.velocities,
        };
        for _ in 0..step.position_iterations {
            let contacts_okay = contact_solver.solve_position_constraints(data.positions);

            let mut joints_okay = true;
            for &id in &self.joints {
                let joint_okay = joints[id].solve_position_constraints(&mut data);
                joints_okay = joints_okay && joint_okay;
            }

            if contacts_okay && joints_okay {
                // Exit early if the position errors are small.
                position_solved = true;
                break;
            }
        }

        self.store(bodies);
        profile.solve_position += elapsed_ms(timer);

        Self::report(&contact_solver, contacts, listeners);

        if allow_sleep {
            self.update_sleep(h, position_solved, bodies);
        }
    }

    fn update_sleep(&self, h: f32, position_solved: bool, bodies: &mut Arena<BodyId, Body>) {
        let mut min_sleep_time = f32::MAX;

        let lin_tol_sqr = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
        let ang_tol_sqr = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

        for &id in &self.bodies {
            let b = &mut bodies[id];
            if b.body_type == BodyType::Static {
                continue;
            }

            if !b.auto_sleep
                || b.angular_velocity * b.angular_velocity > ang_tol_sqr
                || b.linear_velocity.dot(b.linear_velocity) > lin_tol_sqr
            {
                b.sleep_time = 0.0;
                min_sleep_time = 0.0;
            } else {
                b.sleep_time += h;
                min_sleep_time = min_sleep_time.min(b.sleep_time);
            }
        }

        if min_sleep_time >= TIME_TO_SLEEP && position_solved {
            for &id in &self.bodies {
                bodies[id].set_awake(false);
            }
            debug!(bodies = self.bodies.len(), "island fell asleep");
        }
    }

    /// Resolve the penetration of a time-of-impact event and advance the
    /// island over the remaining sub-step. Only the two impact bodies are
    /// moved by the position solve.
    pub(crate) fn solve_toi(
        &mut self,
        sub_step: &TimeStep,
        toi_index_a: usize,
        toi_index_b: usize,
        world: IslandWorld<'_>,
    ) {
        let IslandWorld {
            bodies,
            contacts,
            listeners,
            ..
        } = world;
        debug_assert!(toi_index_a < self.bodies.len() && toi_index_b < self.bodies.len());

        self.load(bodies);

        let mut contact_solver = ContactSolver::new(*sub_step, &self.contacts, contacts, bodies);

        // Solve position constraints.
        for _ in 0..sub_step.position_iterations {
            if contact_solver.solve_toi_position_constraints(
                &mut self.positions,
                toi_index_a,
                toi_index_b,
            ) {
                break;
            }
        }

        // Leap of faith to the new safe state.
        for index in [toi_index_a, toi_index_b] {
            let body = &mut bodies[self.bodies[index]];
            body.sweep.c0 = self.positions[index].c;
            body.sweep.a0 = self.positions[index].a;
        }

        // No warm starting is needed for TOI events because warm
        // starting impulses were applied in the discrete solver.
        contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);

        for _ in 0..sub_step.velocity_iterations {
            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }

        // Don't store the TOI contact forces for warm starting
        // because they can be quite large.

        self.integrate_positions(sub_step.dt);
        self.store(bodies);

        Self::report(&contact_solver, contacts, listeners);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;

    fn step() -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    fn solve_alone(bodies: &mut Arena<BodyId, Body>, id: BodyId, allow_sleep: bool) {
        let mut contacts = Arena::new();
        let mut joints = Arena::new();
        let mut listeners = Listeners::default();
        let mut island = Island::default();
        island.add_body(id, &mut bodies[id]);
        island.solve(
            &step(),
            Vec2::new(0.0, -10.0),
            allow_sleep,
            IslandWorld {
                bodies,
                contacts: &mut contacts,
                joints: &mut joints,
                listeners: &mut listeners,
            },
            &mut Profile::default(),
        );
    }

    #[test]
    fn test_free_fall_integrates_gravity() {
        let mut bodies = Arena::new();
        let id = bodies.insert(Body::new(&BodyDef::dynamic(Vec2::new(0.0, 10.0))));
        solve_alone(&mut bodies, id, false);

        let b = &bodies[id];
        assert!((b.linear_velocity().y + 10.0 / 60.0).abs() < 1e-5);
        // Symplectic Euler: position uses the new velocity.
        assert!((b.position().y - (10.0 - 10.0 / 3600.0)).abs() < 1e-5);
        // The sweep start holds the pre-step state.
        assert_eq!(b.sweep.c0, Vec2::new(0.0, 10.0));
    }

    #[test]
    fn test_gravity_scale_and_damping() {
        let mut bodies = Arena::new();
        let id = bodies.insert(Body::new(
            &BodyDef::dynamic(Vec2::ZERO)
                .with_gravity_scale(0.0)
                .with_velocity(Vec2::new(6.0, 0.0), 0.0)
                .with_damping(60.0, 0.0),
        ));
        solve_alone(&mut bodies, id, false);
        // v / (1 + h * c) with h * c = 1
        assert!((bodies[id].linear_velocity().x - 3.0).abs() < 1e-5);
        assert_eq!(bodies[id].linear_velocity().y, 0.0);
    }

    #[test]
    fn test_translation_is_clamped() {
        let mut bodies = Arena::new();
        let id = bodies.insert(Body::new(
            &BodyDef::dynamic(Vec2::ZERO)
                .with_gravity_scale(0.0)
                .with_velocity(Vec2::new(1000.0, 0.0), 0.0),
        ));
        solve_alone(&mut bodies, id, false);
        assert!((bodies[id].position().x - MAX_TRANSLATION).abs() < 1e-4);
    }

    #[test]
    fn test_resting_body_falls_asleep() {
        let mut bodies = Arena::new();
        let id = bodies.insert(Body::new(
            &BodyDef::dynamic(Vec2::ZERO).with_gravity_scale(0.0),
        ));
        for _ in 0..40 {
            solve_alone(&mut bodies, id, true);
        }
        assert!(!bodies[id].is_awake());
    }

    #[test]
    fn test_no_auto_sleep_keeps_body_awake() {
        let mut bodies = Arena::new();
        let id = bodies.insert(Body::new(
            &BodyDef::dynamic(Vec2::ZERO)
                .with_gravity_scale(0.0)
                .with_allow_sleep(false),
        ));
        for _ in 0..40 {
            solve_alone(&mut bodies, id, true);
        }
        assert!(bodies[id].is_awake());
    }
}
