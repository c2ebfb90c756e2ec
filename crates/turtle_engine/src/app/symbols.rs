use std::collections::HashMap;

use super::math::Vec3;
use super::pool::ActorHandle;

/// Name bindings for spawned actors and queried positions. Both maps are
/// last-writer-wins; handles are borrowed references into the pool.
#[derive(Debug, Default)]
pub struct SymbolTable {
    actors: HashMap<String, ActorHandle>,
    variables: HashMap<String, Vec3>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_actor(
        &mut self,
        name: impl Into<String>,
        handle: ActorHandle,
    ) -> Option<ActorHandle> {
        self.actors.insert(name.into(), handle)
    }

    pub fn actor(&self, name: &str) -> Option<ActorHandle> {
        self.actors.get(name).copied()
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Vec3) -> Option<Vec3> {
        self.variables.insert(name.into(), value)
    }

    pub fn variable(&self, name: &str) -> Option<Vec3> {
        self.variables.get(name).copied()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }
}
