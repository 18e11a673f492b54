/// Host scene units per simulation meter.
///
/// The host scene graph works in centimeters; the simulation works in meters
/// near the origin for numerical stability. All conversion goes through
/// `crate::space`; nothing else should multiply by this directly.
pub const HOST_UNITS_PER_METER: f32 = 100.0;

/// Inverse of [`HOST_UNITS_PER_METER`], kept explicit to avoid repeated division.
pub const METERS_PER_HOST_UNIT: f32 = 1.0 / HOST_UNITS_PER_METER;

/// Default fixed substep length in seconds (60 Hz).
pub const DEFAULT_FIXED_TIMESTEP: f32 = 1.0 / 60.0;

/// Default gravity along the simulation Y axis (m/s²).
pub const DEFAULT_GRAVITY_MPS2: f32 = -9.81;

/// Translation threshold (meters) below which a host pose read during the
/// pre-step phase is considered identical to the body pose and not re-applied.
///
/// Rewriting an unchanged pose every substep would wake sleeping bodies and
/// feed the previous write phase straight back into the solver.
pub const POSE_SYNC_EPS_M: f32 = 1.0e-5;

/// Rotation threshold (radians) companion to [`POSE_SYNC_EPS_M`].
pub const POSE_SYNC_EPS_RAD: f32 = 1.0e-4;
