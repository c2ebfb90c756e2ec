use super::actor::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorHandle(pub usize);

/// Fixed set of actor slots allocated once at startup.
///
/// Slots are handed out in creation order and the pool never grows; once
/// every slot is active `acquire_free_slot` keeps returning `None`.
#[derive(Debug)]
pub struct ActorPool {
    slots: Vec<Actor>,
}

impl ActorPool {
    pub fn preallocate(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Actor::inactive()).collect();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|actor| actor.is_active()).count()
    }

    pub fn acquire_free_slot(&mut self) -> Option<ActorHandle> {
        let index = self.slots.iter().position(|actor| !actor.is_active())?;
        self.slots[index].set_active(true);
        Some(ActorHandle(index))
    }

    /// Returns a slot to the pool. Nothing in the command grammar calls this;
    /// spawned actors stay active for the lifetime of the pool.
    pub fn release(&mut self, handle: ActorHandle) -> bool {
        match self.slots.get_mut(handle.0) {
            Some(actor) if actor.is_active() => {
                actor.set_active(false);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, handle: ActorHandle) -> Option<&Actor> {
        self.slots.get(handle.0).filter(|actor| actor.is_active())
    }

    pub fn get_mut(&mut self, handle: ActorHandle) -> Option<&mut Actor> {
        self.slots
            .get_mut(handle.0)
            .filter(|actor| actor.is_active())
    }
}
