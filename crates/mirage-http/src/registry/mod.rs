//! Configuration registry.
//!
//! This module provides:
//! - `Registry`: the single piece of shared mutable state, holding every
//!   active configuration, the set of routes already bound at the router
//!   level, and the names of every configuration ever registered
//! - `compile_configuration`: validation of submitted documents
//! - `RouteBinder`: the seam through which newly introduced routes are bound
//!
//! Registration claims new routes and binds them while the registry write
//! lock is held, so a route is bound exactly once even when two submissions
//! introduce it at the same time.

mod compile;
mod types;


pub use compile::{compile_configuration, to_route_pattern, WILDCARD_PARAM};
pub use types::{
    ActiveConfiguration, CompiledConfiguration, CompiledRule, Registration, RegistryError,
    ResponseBody, RouteBinding, RouteKey, RouteRules,
};

use crate::metrics;
use chrono::Utc;
use hyper::Method;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Binds routes at the router level.
pub trait RouteBinder: Send + Sync {
    /// Bind every route or none of them.
    fn bind(&self, routes: &[RouteBinding]) -> Result<(), RegistryError>;
}

#[derive(Default)]
struct RegistryState {
    configurations: HashMap<String, Arc<ActiveConfiguration>>,
    bound: HashSet<RouteKey>,
    /// First-registration order, no duplicates
    known: Vec<String>,
}

/// Registry of named configurations
#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one configuration, overwriting any configuration of the same name.
    pub fn register(
        &self,
        configuration: CompiledConfiguration,
        binder: &dyn RouteBinder,
    ) -> Result<Registration, RegistryError> {
        let mut registrations = self.register_all(vec![configuration], binder)?;
        // register_all returns one registration per input
        Ok(registrations.remove(0))
    }

    /// Register a batch of configurations atomically: all of them or none.
    ///
    /// When several configurations of the batch introduce the same route,
    /// the first one in the batch becomes its default configuration.
    pub fn register_all(
        &self,
        configurations: Vec<CompiledConfiguration>,
        binder: &dyn RouteBinder,
    ) -> Result<Vec<Registration>, RegistryError> {
        let mut state = self.state.write();

        let mut claimed: HashSet<RouteKey> = HashSet::new();
        let mut introduced: Vec<Vec<RouteBinding>> = Vec::with_capacity(configurations.len());
        for configuration in &configurations {
            let mut fresh = Vec::new();
            for key in configuration.route_keys() {
                if !state.bound.contains(&key) && claimed.insert(key.clone()) {
                    fresh.push(RouteBinding {
                        key,
                        default_configuration: configuration.name.clone(),
                    });
                }
            }
            introduced.push(fresh);
        }

        let to_bind: Vec<RouteBinding> = introduced.iter().flatten().cloned().collect();
        if !to_bind.is_empty() {
            binder.bind(&to_bind)?;
        }
        state.bound.extend(claimed);

        let registered_at = Utc::now();
        let mut registrations = Vec::with_capacity(configurations.len());
        for (configuration, introduced) in configurations.into_iter().zip(introduced) {
            let name = configuration.name.clone();
            let ttl = configuration.ttl;
            if !state.known.contains(&name) {
                state.known.push(name.clone());
            }
            let replaced = state
                .configurations
                .insert(
                    name.clone(),
                    Arc::new(ActiveConfiguration {
                        configuration,
                        registered_at,
                    }),
                )
                .map(|previous| previous.configuration.name.clone());

            debug!(
                config = %name,
                new_routes = introduced.len(),
                replaced = replaced.is_some(),
                "configuration registered"
            );
            registrations.push(Registration {
                name,
                ttl,
                introduced,
                replaced,
            });
        }

        metrics::set_active_configurations(state.configurations.len());
        metrics::set_route_bindings(state.bound.len());
        Ok(registrations)
    }

    /// Rule for `method` on `path` in configuration `name`.
    pub fn lookup(&self, name: &str, path: &str, method: &Method) -> Option<Arc<CompiledRule>> {
        let state = self.state.read();
        state
            .configurations
            .get(name)
            .and_then(|active| active.configuration.rule(path, method))
            .cloned()
    }

    /// Remove a configuration and all of its rules. Route bindings stay.
    ///
    /// Returns whether a configuration was removed; removing an unknown
    /// name is a no-op.
    pub fn remove(&self, name: &str) -> bool {
        let mut state = self.state.write();
        let removed = state.configurations.remove(name).is_some();
        if removed {
            info!(config = %name, "configuration removed");
            metrics::set_active_configurations(state.configurations.len());
        }
        removed
    }

    /// Every name ever registered, in first-registration order.
    pub fn known_names(&self) -> Vec<String> {
        self.state.read().known.clone()
    }

    /// Names of the configurations currently held, sorted.
    pub fn active_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().configurations.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn describe(&self, name: &str) -> Option<Arc<ActiveConfiguration>> {
        self.state.read().configurations.get(name).cloned()
    }

    pub fn is_bound(&self, key: &RouteKey) -> bool {
        self.state.read().bound.contains(key)
    }

    pub fn bound_count(&self) -> usize {
        self.state.read().bound.len()
    }

    pub fn active_count(&self) -> usize {
        self.state.read().configurations.len()
    }
}
