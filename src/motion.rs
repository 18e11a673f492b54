/*!
Per-dynamic-body transform adapter between a host actor and the simulation.

The world driver calls the two sync methods around each substep; outside code
never does. The bridge holds a weak host reference plus the simulation-origin
snapshot taken at body creation, so all conversion happens in the frame the
body was built in. Sims run re-centered near the origin; the bridge is the one
place where the two spaces meet per body.

Lifecycle: created with the dynamic body, destroyed with it. If the host
object dies first, the first failed upgrade flips the bridge into a terminal
`Orphaned` state; from then on reads report nothing (the body keeps its
last-known pose) and writes are no-ops. The transition is one-way and detected
lazily on access.
*/

use std::cell::Cell;

use crate::actor::{ActorRef, SharedActor};
use crate::space::{SimulationOrigin, to_sim_space, to_world_space};
use crate::types::{Iso, Transform};

pub struct MotionStateBridge {
    parent: ActorRef,
    origin: SimulationOrigin,
    /// Maps the solver's center-of-mass frame to the host graphics frame:
    /// `graphics = solver_pose * com_offset`. Identity when the body frame
    /// already coincides with the graphics frame.
    com_offset: Iso,
    /// Fixed local attachment for bodies driving a component nested under a
    /// moving parent: the write path composes its inverse so the component
    /// ends up at the simulated pose in world space.
    attachment: Option<Transform>,
    orphaned: Cell<bool>,
}

impl MotionStateBridge {
    pub fn new(parent: ActorRef, origin: SimulationOrigin, com_offset: Iso) -> Self {
        Self {
            parent,
            origin,
            com_offset,
            attachment: None,
            orphaned: Cell::new(false),
        }
    }

    /// Variant for attached components (e.g. a simulated part nested under an
    /// animated parent). `attachment` is the component's fixed local transform
    /// relative to that parent.
    pub fn with_attachment(
        parent: ActorRef,
        origin: SimulationOrigin,
        com_offset: Iso,
        attachment: Transform,
    ) -> Self {
        Self {
            parent,
            origin,
            com_offset,
            attachment: Some(attachment),
            orphaned: Cell::new(false),
        }
    }

    pub fn is_orphaned(&self) -> bool {
        self.orphaned.get()
    }

    /// Re-validate the host reference. A failed upgrade is terminal; once
    /// orphaned we never touch the weak pointer again.
    fn host(&self) -> Option<SharedActor> {
        if self.orphaned.get() {
            return None;
        }
        match self.parent.upgrade() {
            Some(actor) => Some(actor),
            None => {
                log::debug!("motion state bridge orphaned; body keeps last-known pose");
                self.orphaned.set(true);
                None
            }
        }
    }

    /// Host → simulation, called before integration. `None` once orphaned;
    /// the caller then leaves the body at its last-known pose.
    pub(crate) fn read_host_transform(&self) -> Option<Iso> {
        let actor = self.host()?;
        let world = actor.borrow().world_transform();
        Some(to_sim_space(&world, self.origin) * self.com_offset.inverse())
    }

    /// Simulation → host, called after integration. No-op once orphaned.
    pub(crate) fn write_host_transform(&self, solver_pose: &Iso) {
        let Some(actor) = self.host() else {
            return;
        };
        let graphics = solver_pose * self.com_offset;
        let mut world = to_world_space(&graphics, self.origin);
        if let Some(attachment) = &self.attachment {
            world = attachment.inverse().compose(&world);
        }
        actor.borrow_mut().set_world_transform(world);
    }
}
