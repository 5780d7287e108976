//! # Handler registry
//!
//! Maps registry identifiers (the scheme-specific part of an `rmi:` address) to
//! handlers. The reserved [`SERVICE_ID`] entry is present from construction and
//! stands for the dispatcher's own service; it cannot be rebound. Every other
//! identifier is last-write-wins and is never removed.
//!
//! Owned exclusively by the dispatcher worker, so it needs no synchronization.

use std::collections::HashMap;

use rmiwire::Address;

use crate::config::SCHEME;
use crate::config::SERVICE_ID;
use crate::error::Error;
use crate::error::Result;
use crate::handler::RpcHandler;
use crate::handler::Target;

/// What an identifier resolves to.
pub(crate) enum Entry {
    /// The dispatcher's built-in service.
    Service,
    Handler(Box<dyn RpcHandler>),
}

pub(crate) struct HandlerRegistry {
    entries: HashMap<String, Entry>,
    torn_down: bool,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(SERVICE_ID.to_string(), Entry::Service);
        Self {
            entries,
            torn_down: false,
        }
    }

    /// Binds `id` to `target` and returns the address it is now reachable at.
    pub fn register(&mut self, id: &str, target: Target) -> Result<Address> {
        if id == SERVICE_ID {
            return Err(Error::ReservedIdentifier(id.to_string()));
        }
        if id.is_empty() {
            return Err(Error::EmptyIdentifier);
        }

        self.entries.insert(id.to_string(), Entry::Handler(target.into_handler()));
        Ok(Address::new(SCHEME, id))
    }

    pub fn resolve(&mut self, id: &str) -> Option<&mut Entry> {
        self.entries.get_mut(id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn handlers(&mut self) -> impl Iterator<Item = &mut Box<dyn RpcHandler>> {
        self.entries.values_mut().filter_map(|entry| match entry {
            Entry::Service => None,
            Entry::Handler(handler) => Some(handler),
        })
    }

    pub fn periodic_cleanup(&mut self) {
        for handler in self.handlers() {
            handler.periodic_cleanup();
        }
    }

    /// Tears every handler down. Later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        for handler in self.handlers() {
            handler.shutdown();
        }
    }
}
