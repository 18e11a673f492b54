/*!
Coordinate conversion between host world space and simulation-local space.

The simulation runs in a local frame re-centered near a configurable origin so
that solver arithmetic stays well-conditioned far from the host world origin.
The mapping is a fixed linear unit conversion (host centimeters → simulation
meters, same axes and handedness on both sides) composed with the origin offset:

- `sim = (world - origin) * METERS_PER_HOST_UNIT`
- `world = sim * HOST_UNITS_PER_METER + origin`

All functions here are pure and exact inverses of each other within float
tolerance. Rotations are unit quaternions on both sides and pass through
unchanged.
*/

use nalgebra as na;

use crate::constants::{HOST_UNITS_PER_METER, METERS_PER_HOST_UNIT};
use crate::types::{Iso, Transform, Vec3};

/// The host-world point the simulation frame is centered on, host units.
///
/// Constant for the lifetime of a simulation world instance; every body pose
/// and every motion state bridge snapshots it at creation. Changing the origin
/// of a live world would require rebuilding every body transform, so the world
/// driver never exposes a setter.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimulationOrigin(pub Vec3);

/// Host world transform → simulation-local isometry.
#[inline]
pub fn to_sim_space(world: &Transform, origin: SimulationOrigin) -> Iso {
    Iso::from_parts(
        na::Translation3::from((world.translation - origin.0) * METERS_PER_HOST_UNIT),
        world.rotation,
    )
}

/// Simulation-local isometry → host world transform.
#[inline]
pub fn to_world_space(sim: &Iso, origin: SimulationOrigin) -> Transform {
    Transform {
        translation: sim.translation.vector * HOST_UNITS_PER_METER + origin.0,
        rotation: sim.rotation,
    }
}

/// Convert a direction-like quantity (velocity, force, impulse) to sim units.
/// No origin offset is applied.
#[inline]
pub fn to_sim_vector(v: Vec3) -> Vec3 {
    v * METERS_PER_HOST_UNIT
}

/// Inverse of [`to_sim_vector`].
#[inline]
pub fn to_world_vector(v: Vec3) -> Vec3 {
    v * HOST_UNITS_PER_METER
}

/// Convert a host-world point (e.g. a force application location) into the
/// simulation-local frame.
#[inline]
pub fn to_sim_point(p: Vec3, origin: SimulationOrigin) -> na::Point3<f32> {
    na::Point3::from((p - origin.0) * METERS_PER_HOST_UNIT)
}

/// Inverse of [`to_sim_point`].
#[inline]
pub fn to_world_point(p: na::Point3<f32>, origin: SimulationOrigin) -> Vec3 {
    p.coords * HOST_UNITS_PER_METER + origin.0
}

/// Convert a parent-relative host transform (e.g. a sub-shape offset produced
/// by geometry extraction) into a simulation-scale local isometry. Relative
/// transforms carry no origin offset, only the unit conversion.
#[inline]
pub fn to_sim_local(relative: &Transform) -> Iso {
    Iso::from_parts(
        na::Translation3::from(relative.translation * METERS_PER_HOST_UNIT),
        relative.rotation,
    )
}
