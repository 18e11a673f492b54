/*!
Host scene-graph actor contract.

The bridge never owns scene objects. Dynamic bodies hold a weak reference to
the actor (or component) they synchronize with, so the host can destroy an
actor at any time without the simulation keeping it alive or crashing on the
next sync. Liveness is re-checked on every access via `Weak::upgrade`.
*/

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::types::Transform;

/// Minimal interface the bridge requires from a host scene-graph object.
///
/// Implementors expose their current world transform and accept transform
/// writes after each simulation step. Transforms are host-space, host units.
pub trait SceneActor {
    fn world_transform(&self) -> Transform;
    fn set_world_transform(&mut self, transform: Transform);
}

/// Owning handle to a host actor, held by the host application.
pub type SharedActor = Rc<RefCell<dyn SceneActor>>;

/// Non-owning reference to a host actor, held by motion state bridges.
pub type ActorRef = Weak<RefCell<dyn SceneActor>>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::{Quat, Vec3};
    use std::rc::Rc;

    /// Bare-bones actor used across the crate's tests.
    pub struct TestActor {
        pub transform: Transform,
    }

    impl TestActor {
        pub fn shared(translation: Vec3) -> SharedActor {
            Rc::new(RefCell::new(TestActor {
                transform: Transform::new(translation, Quat::identity()),
            }))
        }
    }

    impl SceneActor for TestActor {
        fn world_transform(&self) -> Transform {
            self.transform
        }

        fn set_world_transform(&mut self, transform: Transform) {
            self.transform = transform;
        }
    }
}
