//! Error types for bridge operations.

use thiserror::Error;

use crate::registry::BodyHandle;

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors reported by body creation and handle-based operations.
///
/// Orphaned host references are deliberately *not* represented here: a dynamic
/// body whose host actor has been destroyed keeps simulating at its last-known
/// transform and the condition is absorbed inside the motion state bridge
/// rather than surfaced every tick.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Operation referenced a body handle that does not exist or was removed.
    /// Non-fatal: callers skip the operation, no state changes.
    #[error("unknown or removed body handle {0:?}")]
    InvalidHandle(BodyHandle),

    /// Shape construction received empty or zero-measure input. The
    /// create-body request fails and nothing is inserted into the world.
    #[error("degenerate collision geometry: {0}")]
    DegenerateGeometry(&'static str),

    /// A dynamic body was requested with zero or negative mass. Use a static
    /// body for immovable geometry instead.
    #[error("dynamic body mass must be positive, got {0}")]
    InvalidMass(f32),
}
