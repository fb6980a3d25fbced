//! Table of every server in the fleet.

use crate::error::{Error, Result};
use crate::server::{ServerId, ServerInstance};
use std::collections::HashMap;
use std::sync::Arc;

/// Servers indexed by id and by case-folded display name.
///
/// Populated once at bootstrap; afterwards it is only read, so lookups need
/// no locking.
#[derive(Default)]
pub struct ServerRegistry {
    by_id: HashMap<ServerId, Arc<ServerInstance>>,
    by_name: HashMap<String, ServerId>,
    /// Registration order, used by `all`
    order: Vec<ServerId>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server. Names must be unique ignoring case, ids must be unique.
    pub fn register(&mut self, instance: ServerInstance) -> Result<Arc<ServerInstance>> {
        let key = instance.display_name().to_lowercase();
        if self.by_name.contains_key(&key) {
            return Err(Error::ConfigInvalid(format!(
                "Duplicate server name '{}'",
                instance.display_name()
            )));
        }
        if self.by_id.contains_key(&instance.id()) {
            return Err(Error::ConfigInvalid(format!("Duplicate server id '{}'", instance.id())));
        }

        let id = instance.id();
        let instance = Arc::new(instance);
        self.by_id.insert(id, Arc::clone(&instance));
        self.by_name.insert(key, id);
        self.order.push(id);
        Ok(instance)
    }

    /// Case-insensitive exact lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<ServerInstance>> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }

    pub fn find_by_id(&self, id: ServerId) -> Option<Arc<ServerInstance>> {
        self.by_id.get(&id).cloned()
    }

    /// Every server, in registration order.
    pub fn all(&self) -> Vec<Arc<ServerInstance>> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
