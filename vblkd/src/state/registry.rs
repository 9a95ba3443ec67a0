use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::types::VirtioBlk;

/// Controllers created by this process, keyed by resource name.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: Mutex<HashMap<String, VirtioBlk>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VirtioBlk>> {
        self.controllers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<VirtioBlk> {
        self.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Store `controller` under its name unless an entry already exists, and
    /// return whichever representation the registry now holds.
    ///
    /// Two creates racing on the same name both reach the backend; the first
    /// to get here wins and both callers see its representation.
    pub fn insert_or_get(&self, controller: VirtioBlk) -> VirtioBlk {
        debug_assert!(!controller.name.is_empty(), "controller name must be set");
        self.lock()
            .entry(controller.name.clone())
            .or_insert(controller)
            .clone()
    }

    pub fn remove(&self, name: &str) -> Option<VirtioBlk> {
        self.lock().remove(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
