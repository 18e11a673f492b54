/*!
World driver: owns one complete simulation world and its stepping loop.

One driver per host world. It aggregates the rapier pipeline and phase
structures, the shape cache and the body registry, and exposes the whole
bridge surface as handle-based operations. Everything is single-threaded and
synchronous; `step` returns only after the write phase of the last substep,
so callers observe a consistent world after every call.
*/

use rapier3d::prelude::*;

use crate::actor::ActorRef;
use crate::constants::{DEFAULT_FIXED_TIMESTEP, DEFAULT_GRAVITY_MPS2};
use crate::error::{BridgeError, BridgeResult};
use crate::geometry::{GeometryDesc, TriangleSoup, extract_geometry};
use crate::registry::{BodyHandle, BodyRegistry, BodyState};
use crate::shape::ShapeCache;
use crate::space::{SimulationOrigin, to_sim_local};
use crate::types::{Iso, Transform, Vec3};

/// World construction parameters. Host-space origin, simulation-space gravity
/// (m/s²) and the fixed integration increment in seconds.
#[derive(Clone, Copy, Debug)]
pub struct WorldConfig {
    pub origin: SimulationOrigin,
    pub gravity: Vec3,
    pub fixed_timestep: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            origin: SimulationOrigin::default(),
            gravity: Vec3::new(0.0, DEFAULT_GRAVITY_MPS2, 0.0),
            fixed_timestep: DEFAULT_FIXED_TIMESTEP,
        }
    }
}

pub struct WorldDriver {
    config: WorldConfig,
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    ccd_solver: CCDSolver,
    cache: ShapeCache,
    registry: BodyRegistry,
    /// Unsimulated time carried between `step` calls.
    accumulator: f32,
}

impl WorldDriver {
    pub fn new(config: WorldConfig) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = config.fixed_timestep;
        Self {
            config,
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            cache: ShapeCache::new(),
            registry: BodyRegistry::new(),
            accumulator: 0.0,
        }
    }

    pub fn origin(&self) -> SimulationOrigin {
        self.config.origin
    }

    pub fn body_count(&self) -> usize {
        self.registry.body_count()
    }

    /// Create an immovable body from an actor's extracted geometry.
    pub fn add_static_body(
        &mut self,
        geometry: &GeometryDesc,
        world_transform: &Transform,
        friction: f32,
        restitution: f32,
    ) -> BridgeResult<BodyHandle> {
        let mut parts: Vec<(Iso, SharedShape)> = Vec::new();
        let mut first_err: Option<BridgeError> = None;
        extract_geometry(geometry, &Transform::identity(), &mut |sub, xform| {
            if first_err.is_some() {
                return;
            }
            match self.cache.resolve(&sub) {
                Ok(shape) => parts.push((to_sim_local(xform), shape)),
                Err(e) => first_err = Some(e),
            }
        });
        if let Some(e) = first_err {
            return Err(e);
        }
        self.registry.add_static(
            parts,
            world_transform,
            friction,
            restitution,
            self.config.origin,
        )
    }

    /// Create a dynamic body bound to `actor`. Shape and mass properties are
    /// cached per `(class_id, mass)` so instances of one actor class share a
    /// single cooked shape.
    pub fn add_dynamic_body(
        &mut self,
        class_id: u64,
        geometry: &GeometryDesc,
        mass: f32,
        friction: f32,
        restitution: f32,
        initial_world_transform: &Transform,
        actor: ActorRef,
    ) -> BridgeResult<BodyHandle> {
        let data = self.cache.dynamic_shape(class_id, geometry, mass)?;
        self.registry.add_dynamic(
            &data,
            friction,
            restitution,
            initial_world_transform,
            actor,
            self.config.origin,
        )
    }

    /// Create an immovable body from procedurally generated quad soup.
    pub fn add_triangle_soup_body(
        &mut self,
        soup: &TriangleSoup,
        world_transform: &Transform,
        friction: f32,
        restitution: f32,
    ) -> BridgeResult<BodyHandle> {
        let shape = self.cache.get_triangle_mesh(soup)?;
        self.registry.add_static(
            vec![(Iso::identity(), shape)],
            world_transform,
            friction,
            restitution,
            self.config.origin,
        )
    }

    /// Swap a procedural body's backing geometry: removes `prev_handle` (a
    /// logged no-op if already gone) and inserts a body cooked from `soup`.
    /// The returned handle is always fresh.
    pub fn replace_triangle_soup_body(
        &mut self,
        prev_handle: BodyHandle,
        soup: &TriangleSoup,
        world_transform: &Transform,
        friction: f32,
        restitution: f32,
    ) -> BridgeResult<BodyHandle> {
        let shape = self.cache.get_triangle_mesh(soup)?;
        self.registry.remove(prev_handle);
        self.registry.add_static(
            vec![(Iso::identity(), shape)],
            world_transform,
            friction,
            restitution,
            self.config.origin,
        )
    }

    pub fn remove(&mut self, handle: BodyHandle) {
        self.registry.remove(handle);
    }

    pub fn set_state(
        &mut self,
        handle: BodyHandle,
        transform: &Transform,
        linear_velocity: Vec3,
        angular_velocity: Vec3,
    ) -> BridgeResult<Vec3> {
        self.registry.set_state(
            handle,
            transform,
            linear_velocity,
            angular_velocity,
            self.config.origin,
        )
    }

    pub fn get_state(&self, handle: BodyHandle) -> BridgeResult<BodyState> {
        self.registry.get_state(handle, self.config.origin)
    }

    pub fn add_impulse(
        &mut self,
        handle: BodyHandle,
        impulse: Vec3,
        world_location: Vec3,
    ) -> BridgeResult<()> {
        self.registry
            .add_impulse(handle, impulse, world_location, self.config.origin)
    }

    pub fn add_force(
        &mut self,
        handle: BodyHandle,
        force: Vec3,
        world_location: Vec3,
    ) -> BridgeResult<()> {
        self.registry
            .add_force(handle, force, world_location, self.config.origin)
    }

    /// Advance the world by `delta_seconds` of wall time.
    ///
    /// Integration always runs in fixed increments of the configured timestep;
    /// leftover time accumulates into the next call. At most `max_substeps`
    /// increments run per call; whole increments of unprocessed backlog are
    /// discarded afterwards (only a sub-increment remainder carries over), so
    /// a long stall slows the simulation down instead of spiraling. Each
    /// substep runs read phase, solve, then write phase, in that order, with
    /// no interleaving. Returns the number of substeps taken.
    pub fn step(&mut self, delta_seconds: f32, max_substeps: u32) -> u32 {
        let dt = self.config.fixed_timestep;
        self.accumulator += delta_seconds.max(0.0);

        let mut substeps = 0;
        while self.accumulator >= dt && substeps < max_substeps {
            self.registry.pre_step_sync();
            self.pipeline.step(
                &self.config.gravity,
                &self.integration_parameters,
                &mut self.registry.islands,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.registry.bodies,
                &mut self.registry.colliders,
                &mut self.registry.impulse_joints,
                &mut self.registry.multibody_joints,
                &mut self.ccd_solver,
                &(),
                &(),
            );
            self.registry.post_step_sync();
            self.accumulator -= dt;
            substeps += 1;
        }

        if self.accumulator >= dt {
            let remainder = self.accumulator % dt;
            log::debug!(
                "step fell behind; dropping {:.3}s of backlog",
                self.accumulator - remainder
            );
            self.accumulator = remainder;
        }
        if substeps > 0 {
            self.registry.reset_forces();
        }
        substeps
    }

    /// Drop every body and cached shape and rebuild empty phase structures.
    /// The configuration, including the simulation origin, is kept.
    pub fn reset(&mut self) {
        self.registry = BodyRegistry::new();
        self.cache.clear();
        self.pipeline = PhysicsPipeline::new();
        self.broad_phase = BroadPhaseBvh::new();
        self.narrow_phase = NarrowPhase::new();
        self.ccd_solver = CCDSolver::new();
        self.accumulator = 0.0;
    }
}

impl Default for WorldDriver {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::test_support::TestActor;
    use crate::geometry::{ComponentShape, GeometryComponent, GeometryDesc, PrimitiveShape};
    use crate::types::Quat;
    use std::rc::Rc;

    fn primitive_desc(shape: PrimitiveShape) -> GeometryDesc {
        GeometryDesc {
            components: vec![GeometryComponent::new(
                ComponentShape::Primitive(shape),
                Transform::identity(),
            )],
        }
    }

    fn flat_soup(id: u64) -> TriangleSoup {
        let v = |x: f32, z: f32| Vec3::new(x, 0.0, z);
        TriangleSoup {
            vertex_set_id: id,
            a: vec![v(-500.0, -500.0)],
            b: vec![v(500.0, -500.0)],
            c: vec![v(500.0, 500.0)],
            d: vec![v(-500.0, 500.0)],
        }
    }

    #[test]
    fn invalid_mass_leaves_the_world_unchanged() {
        let mut world = WorldDriver::default();
        let actor = TestActor::shared(Vec3::zeros());
        let desc = primitive_desc(PrimitiveShape::Sphere { radius: 50.0 });

        let result = world.add_dynamic_body(
            1,
            &desc,
            0.0,
            0.5,
            0.0,
            &Transform::identity(),
            Rc::downgrade(&actor),
        );
        assert!(matches!(result, Err(BridgeError::InvalidMass(_))));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn sphere_drops_onto_static_floor_and_settles() {
        let mut world = WorldDriver::default();

        // Floor slab whose top face sits at y = 0.
        let floor = primitive_desc(PrimitiveShape::Box {
            half_extents: Vec3::new(500.0, 50.0, 500.0),
        });
        world
            .add_static_body(
                &floor,
                &Transform::new(Vec3::new(0.0, -50.0, 0.0), Quat::identity()),
                0.8,
                0.0,
            )
            .unwrap();

        let actor = TestActor::shared(Vec3::new(0.0, 300.0, 0.0));
        let sphere = primitive_desc(PrimitiveShape::Sphere { radius: 50.0 });
        world
            .add_dynamic_body(
                2,
                &sphere,
                5.0,
                0.8,
                0.0,
                &actor.borrow().world_transform(),
                Rc::downgrade(&actor),
            )
            .unwrap();

        for _ in 0..180 {
            world.step(1.0 / 60.0, 4);
        }

        // The host actor follows the simulated fall and comes to rest with
        // the sphere's center one radius above the floor.
        let y = actor.borrow().world_transform().translation.y;
        assert!(y < 200.0, "sphere fell (y = {y})");
        assert!((y - 50.0).abs() < 15.0, "sphere rests on the floor (y = {y})");
    }

    #[test]
    fn orphaned_actor_does_not_break_stepping() {
        let mut world = WorldDriver::default();
        let actor = TestActor::shared(Vec3::new(0.0, 100.0, 0.0));
        let sphere = primitive_desc(PrimitiveShape::Sphere { radius: 25.0 });

        let handle = world
            .add_dynamic_body(
                3,
                &sphere,
                1.0,
                0.5,
                0.0,
                &actor.borrow().world_transform(),
                Rc::downgrade(&actor),
            )
            .unwrap();

        drop(actor);

        for _ in 0..30 {
            world.step(1.0 / 60.0, 4);
        }

        // The body is still simulated and queryable; it simply stopped
        // syncing with a host.
        assert_eq!(world.body_count(), 1);
        let state = world.get_state(handle).unwrap();
        assert!(state.transform.translation.y < 100.0);
    }

    #[test]
    fn step_clamps_substeps_and_drops_backlog() {
        let mut world = WorldDriver::default();

        assert_eq!(world.step(1.0, 4), 4);
        // Whole increments of backlog were discarded, leaving less than one
        // increment behind, so one increment of new time runs exactly one
        // substep instead of draining the stall.
        assert_eq!(world.step(1.0 / 60.0, 4), 1);
        // No time, no substeps.
        assert_eq!(world.step(0.0, 4), 0);
    }

    #[test]
    fn replacing_a_soup_body_swaps_handles() {
        let mut world = WorldDriver::default();

        let first = world
            .add_triangle_soup_body(&flat_soup(1), &Transform::identity(), 0.5, 0.0)
            .unwrap();
        assert_eq!(world.body_count(), 1);

        let second = world
            .replace_triangle_soup_body(first, &flat_soup(2), &Transform::identity(), 0.5, 0.0)
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(world.body_count(), 1);
        assert!(matches!(
            world.get_state(first),
            Err(BridgeError::InvalidHandle(_))
        ));
    }

    #[test]
    fn reset_drops_all_bodies_but_keeps_the_origin() {
        let config = WorldConfig {
            origin: SimulationOrigin(Vec3::new(1000.0, 0.0, 0.0)),
            ..WorldConfig::default()
        };
        let mut world = WorldDriver::new(config);
        world
            .add_triangle_soup_body(&flat_soup(9), &Transform::identity(), 0.5, 0.0)
            .unwrap();
        assert_eq!(world.body_count(), 1);

        world.reset();
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.origin().0, Vec3::new(1000.0, 0.0, 0.0));
    }
}
