/*!
Body registry: the handle → simulation-object mapping.

Owns the rapier body/collider sets plus the bookkeeping that turns them into a
stable, handle-based API. Handles are opaque integers, unique while live and
never reused; entries keep the per-body motion state bridge for dynamics.

Entries live in a `BTreeMap` so every per-tick walk (sync phases, teardown)
visits bodies in allocation order: same inputs, same traversal, matching the
deterministic-build convention used for world construction.
*/

use std::collections::BTreeMap;

use rapier3d::prelude::*;

use crate::actor::ActorRef;
use crate::constants::{POSE_SYNC_EPS_M, POSE_SYNC_EPS_RAD};
use crate::error::{BridgeError, BridgeResult};
use crate::motion::MotionStateBridge;
use crate::shape::DynamicShapeData;
use crate::space::{
    SimulationOrigin, to_sim_point, to_sim_space, to_sim_vector, to_world_space, to_world_vector,
};
use crate::types::{Iso, Transform, Vec3};

/// Opaque identifier of one bridge-managed body (static or dynamic).
///
/// Unique while the body is live and stable for its lifetime. Allocation is
/// monotonic, so a handle is never reused even after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle(u64);

enum BodyKind {
    Static,
    Dynamic { bridge: MotionStateBridge },
}

struct BodyEntry {
    kind: BodyKind,
    body: RigidBodyHandle,
}

/// Read-only kinematic snapshot of a dynamic body, host units.
#[derive(Clone, Copy, Debug)]
pub struct BodyState {
    pub transform: Transform,
    pub linear_velocity: Vec3,
    /// Angular velocity in rad/s (unit-scale free).
    pub angular_velocity: Vec3,
    /// Force accumulated since the last step / state overwrite.
    pub accumulated_force: Vec3,
}

/// Owns every simulation body created through the bridge. One registry per
/// world driver; torn down wholesale on reset.
pub struct BodyRegistry {
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    pub(crate) islands: IslandManager,
    pub(crate) impulse_joints: ImpulseJointSet,
    pub(crate) multibody_joints: MultibodyJointSet,
    entries: BTreeMap<BodyHandle, BodyEntry>,
    next_handle: u64,
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            islands: IslandManager::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            entries: BTreeMap::new(),
            next_handle: 0,
        }
    }

    pub fn body_count(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    fn allocate_handle(&mut self) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn entry(&self, handle: BodyHandle) -> BridgeResult<&BodyEntry> {
        self.entries
            .get(&handle)
            .ok_or(BridgeError::InvalidHandle(handle))
    }

    /// Insert an immovable body made of one or more sub-shapes at their
    /// extraction-relative poses. No motion state; the transform is fixed at
    /// creation.
    pub fn add_static(
        &mut self,
        parts: Vec<(Iso, SharedShape)>,
        world_transform: &Transform,
        friction: f32,
        restitution: f32,
        origin: SimulationOrigin,
    ) -> BridgeResult<BodyHandle> {
        if parts.is_empty() {
            return Err(BridgeError::DegenerateGeometry("no collision geometry"));
        }

        let pose = to_sim_space(world_transform, origin);
        let rb = RigidBodyBuilder::fixed().pose(pose).build();
        let body = self.bodies.insert(rb);

        for (relative, shape) in parts {
            let collider = ColliderBuilder::new(shape)
                .friction(friction)
                .restitution(restitution)
                .build();
            let co = self
                .colliders
                .insert_with_parent(collider, body, &mut self.bodies);
            if let Some(collider) = self.colliders.get_mut(co) {
                collider.set_position_wrt_parent(relative);
            }
        }

        let handle = self.allocate_handle();
        self.entries.insert(
            handle,
            BodyEntry {
                kind: BodyKind::Static,
                body,
            },
        );
        Ok(handle)
    }

    /// Insert a dynamic body with precomputed shape/mass data and bind its
    /// motion state bridge to `actor`.
    pub fn add_dynamic(
        &mut self,
        data: &DynamicShapeData,
        friction: f32,
        restitution: f32,
        initial_world: &Transform,
        actor: ActorRef,
        origin: SimulationOrigin,
    ) -> BridgeResult<BodyHandle> {
        if data.mass <= 0.0 {
            return Err(BridgeError::InvalidMass(data.mass));
        }

        // Rapier tracks the center of mass internally and exposes body poses
        // in the body-origin frame, which is also the host graphics frame
        // here, so the bridge offset is identity.
        let bridge = MotionStateBridge::new(actor, origin, Iso::identity());

        let pose = to_sim_space(initial_world, origin);
        let rb = RigidBodyBuilder::dynamic()
            .pose(pose)
            .additional_mass_properties(data.mass_properties)
            .build();
        let body = self.bodies.insert(rb);

        // Density zero: the body's mass comes entirely from the cached mass
        // properties above, not from the collider volume.
        let collider = ColliderBuilder::new(data.shape.clone())
            .density(0.0)
            .friction(friction)
            .restitution(restitution)
            .build();
        self.colliders
            .insert_with_parent(collider, body, &mut self.bodies);

        let handle = self.allocate_handle();
        self.entries.insert(
            handle,
            BodyEntry {
                kind: BodyKind::Dynamic { bridge },
                body,
            },
        );
        Ok(handle)
    }

    /// Remove a body and everything attached to it. Idempotent: removing an
    /// unknown or already-removed handle is a logged no-op.
    pub fn remove(&mut self, handle: BodyHandle) {
        let Some(entry) = self.entries.remove(&handle) else {
            log::debug!("remove: handle {handle:?} unknown or already removed, skipping");
            return;
        };
        self.bodies.remove(
            entry.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Overwrite a body's kinematic state (teleport/respawn). Returns the
    /// force accumulated before the overwrite, host units; accumulated forces
    /// are cleared.
    pub fn set_state(
        &mut self,
        handle: BodyHandle,
        transform: &Transform,
        linear_velocity: Vec3,
        angular_velocity: Vec3,
        origin: SimulationOrigin,
    ) -> BridgeResult<Vec3> {
        let rb = self.entry(handle)?.body;
        let body = self
            .bodies
            .get_mut(rb)
            .ok_or(BridgeError::InvalidHandle(handle))?;

        let previous_force = to_world_vector(body.user_force());
        body.set_position(to_sim_space(transform, origin), true);
        body.set_linvel(to_sim_vector(linear_velocity), true);
        body.set_angvel(angular_velocity, true);
        body.reset_forces(true);
        Ok(previous_force)
    }

    /// Read-only snapshot of a body's kinematic state, host units.
    pub fn get_state(
        &self,
        handle: BodyHandle,
        origin: SimulationOrigin,
    ) -> BridgeResult<BodyState> {
        let rb = self.entry(handle)?.body;
        let body = self
            .bodies
            .get(rb)
            .ok_or(BridgeError::InvalidHandle(handle))?;

        Ok(BodyState {
            transform: to_world_space(body.position(), origin),
            linear_velocity: to_world_vector(*body.linvel()),
            angular_velocity: *body.angvel(),
            accumulated_force: to_world_vector(body.user_force()),
        })
    }

    /// Apply an impulse at a host-world application point.
    pub fn add_impulse(
        &mut self,
        handle: BodyHandle,
        impulse: Vec3,
        world_location: Vec3,
        origin: SimulationOrigin,
    ) -> BridgeResult<()> {
        let rb = self.entry(handle)?.body;
        let body = self
            .bodies
            .get_mut(rb)
            .ok_or(BridgeError::InvalidHandle(handle))?;
        body.apply_impulse_at_point(
            to_sim_vector(impulse),
            to_sim_point(world_location, origin),
            true,
        );
        Ok(())
    }

    /// Accumulate a force at a host-world application point. Forces are
    /// cleared after each completed step, matching accumulate-then-integrate
    /// semantics.
    pub fn add_force(
        &mut self,
        handle: BodyHandle,
        force: Vec3,
        world_location: Vec3,
        origin: SimulationOrigin,
    ) -> BridgeResult<()> {
        let rb = self.entry(handle)?.body;
        let body = self
            .bodies
            .get_mut(rb)
            .ok_or(BridgeError::InvalidHandle(handle))?;
        body.add_force_at_point(
            to_sim_vector(force),
            to_sim_point(world_location, origin),
            true,
        );
        Ok(())
    }

    /// Read phase: pull host transforms into the simulation before a substep.
    ///
    /// A pose that matches the body's current pose (within epsilon) is not
    /// rewritten: that keeps sleeping bodies asleep and guarantees a read
    /// never re-applies the previous write phase's output.
    pub(crate) fn pre_step_sync(&mut self) {
        for entry in self.entries.values() {
            let BodyKind::Dynamic { bridge } = &entry.kind else {
                continue;
            };
            let Some(target) = bridge.read_host_transform() else {
                continue; // orphaned: body keeps its last-known pose
            };
            let Some(body) = self.bodies.get_mut(entry.body) else {
                continue;
            };
            let current = body.position();
            let translated =
                (current.translation.vector - target.translation.vector).norm() > POSE_SYNC_EPS_M;
            let rotated = current.rotation.angle_to(&target.rotation) > POSE_SYNC_EPS_RAD;
            if translated || rotated {
                body.set_position(target, true);
            }
        }
    }

    /// Write phase: push simulated poses back to host actors after a substep.
    /// Sleeping bodies are skipped; their hosts already hold the final pose.
    pub(crate) fn post_step_sync(&self) {
        for entry in self.entries.values() {
            let BodyKind::Dynamic { bridge } = &entry.kind else {
                continue;
            };
            let Some(body) = self.bodies.get(entry.body) else {
                continue;
            };
            if body.is_sleeping() {
                continue;
            }
            bridge.write_host_transform(body.position());
        }
    }

    /// Clear accumulated user forces on every dynamic body. Called by the
    /// driver once per completed `step`.
    pub(crate) fn reset_forces(&mut self) {
        for entry in self.entries.values() {
            if matches!(entry.kind, BodyKind::Static) {
                continue;
            }
            if let Some(body) = self.bodies.get_mut(entry.body) {
                body.reset_forces(false);
            }
        }
    }
}

impl Default for BodyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
