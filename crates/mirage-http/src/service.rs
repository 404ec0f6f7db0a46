//! The Mirage service: registry, router, expiry and dispatch wired together.

use crate::dispatch::{Dispatcher, RouteTable};
use crate::document::{ConfigurationDocument, ConfigurationSet};
use crate::expiry::ExpiryScheduler;
use crate::metrics;
use crate::registry::{
    compile_configuration, ActiveConfiguration, CompiledConfiguration, Registration, Registry,
    RegistryError,
};
use crate::selection::SelectionResolver;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::HeaderMap;
use hyper::{Method, Response};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state behind both listeners.
pub struct MirageService {
    registry: Arc<Registry>,
    routes: Arc<RouteTable>,
    expiry: ExpiryScheduler,
    dispatcher: Dispatcher,
}

impl Default for MirageService {
    fn default() -> Self {
        Self::new(SelectionResolver::default())
    }
}

impl MirageService {
    pub fn new(selection: SelectionResolver) -> Self {
        let registry = Arc::new(Registry::new());
        let routes = Arc::new(RouteTable::new());
        Self {
            expiry: ExpiryScheduler::new(Arc::clone(&registry)),
            dispatcher: Dispatcher::new(Arc::clone(&registry), Arc::clone(&routes), selection),
            registry,
            routes,
        }
    }

    /// Register every configuration of a document, or none of them.
    ///
    /// TTL timers are armed after the whole document is registered, so this
    /// must run inside a tokio runtime when any configuration has a TTL.
    pub fn submit(&self, document: ConfigurationSet) -> Result<Vec<Registration>, RegistryError> {
        let compiled = document
            .iter()
            .map(|(name, configuration)| compile_configuration(name, configuration))
            .collect::<Result<Vec<CompiledConfiguration>, _>>()
            .inspect_err(|_| metrics::record_registration("rejected"))?;

        let registrations = self
            .registry
            .register_all(compiled, self.routes.as_ref())
            .inspect_err(|_| metrics::record_registration("rejected"))?;

        for registration in &registrations {
            if let Some(ttl) = registration.ttl {
                self.expiry.arm(&registration.name, ttl);
            }
            match &registration.replaced {
                Some(previous) => {
                    warn!(config = %previous, "configuration overwritten by a new registration");
                    metrics::record_registration("replaced");
                }
                None => metrics::record_registration("created"),
            }
            info!(
                config = %registration.name,
                ttl = ?registration.ttl,
                new_routes = registration.introduced.len(),
                "configuration accepted"
            );
        }
        Ok(registrations)
    }

    /// Register a single configuration.
    pub fn register(
        &self,
        name: &str,
        configuration: ConfigurationDocument,
    ) -> Result<Registration, RegistryError> {
        let mut document = ConfigurationSet::new();
        document.insert(name.to_string(), configuration);
        let mut registrations = self.submit(document)?;
        // submit returns one registration per configuration
        Ok(registrations.remove(0))
    }

    /// Answer a request on the serving surface.
    pub async fn handle(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Response<Full<Bytes>> {
        self.dispatcher.handle(method, path, headers).await
    }

    /// Administrative removal; pending TTL timers for the name stay armed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.registry.remove(name);
        metrics::record_removal("admin", removed);
        removed
    }

    pub fn known_names(&self) -> Vec<String> {
        self.registry.known_names()
    }

    pub fn active_names(&self) -> Vec<String> {
        self.registry.active_names()
    }

    pub fn describe(&self, name: &str) -> Option<Arc<ActiveConfiguration>> {
        self.registry.describe(name)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn expiry(&self) -> &ExpiryScheduler {
        &self.expiry
    }

    pub fn selection(&self) -> &SelectionResolver {
        self.dispatcher.selection()
    }

    /// Abort pending expiry timers.
    pub fn shutdown(&self) {
        self.expiry.shutdown();
    }
}
