/*!
Bridge between a host scene graph and a rigid-body physics simulation.

The host keeps authoring its world in its own units and coordinate frame; this
crate owns the simulation side: shape cooking and caching, body lifetime,
fixed-timestep integration and the per-body transform synchronization that
keeps scene actors and simulated bodies in agreement.

Entry point is [`WorldDriver`]: one per host world. Bodies are referred to by
opaque [`BodyHandle`]s; dynamic bodies additionally bind a weak [`SceneActor`]
reference that the driver syncs around every substep.
*/

pub mod actor;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod motion;
pub mod registry;
pub mod shape;
pub mod space;
pub mod types;
pub mod world;

pub use actor::{ActorRef, SceneActor, SharedActor};
pub use error::{BridgeError, BridgeResult};
pub use geometry::{
    BodySetup, ComponentShape, ConvexPiece, GeometryComponent, GeometryDesc, MeshShape,
    PrimitiveShape, TriangleSoup,
};
pub use registry::{BodyHandle, BodyState};
pub use shape::same_shape;
pub use space::SimulationOrigin;
pub use types::{Quat, Transform, Vec3};
pub use world::{WorldConfig, WorldDriver};
