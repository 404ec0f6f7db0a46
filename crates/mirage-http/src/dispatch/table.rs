//! Router table: one radix trie per HTTP method.

use super::DispatchError;
use crate::registry::{RegistryError, RouteBinder, RouteBinding};
use hyper::Method;
use matchit::Router;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Routes bound for one method.
struct MethodRoutes {
    router: Router<Arc<RouteBinding>>,
    /// Kept so the trie can be rebuilt; `Router` cannot be cloned or iterated
    bindings: Vec<Arc<RouteBinding>>,
}

impl Default for MethodRoutes {
    fn default() -> Self {
        Self {
            router: Router::new(),
            bindings: Vec::new(),
        }
    }
}

impl MethodRoutes {
    /// Build a trie holding `existing` plus `added`, leaving `self` untouched.
    fn extended(&self, added: &[RouteBinding]) -> Result<MethodRoutes, RegistryError> {
        let mut next = MethodRoutes::default();
        let existing = self.bindings.iter().cloned();
        let added = added.iter().cloned().map(Arc::new);
        for binding in existing.chain(added) {
            next.router
                .insert(binding.key.path.clone(), Arc::clone(&binding))
                .map_err(|e| RegistryError::RouteConflict {
                    method: binding.key.method.to_string(),
                    path: binding.key.path.clone(),
                    reason: e.to_string(),
                })?;
            next.bindings.push(binding);
        }
        Ok(next)
    }
}

/// A matched request.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub binding: Arc<RouteBinding>,
    /// Percent-decoded path parameters, in pattern order
    pub params: Vec<(String, String)>,
}

/// Framework-level routes.
#[derive(Default)]
pub struct RouteTable {
    methods: RwLock<HashMap<Method, MethodRoutes>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `path` among the routes bound for `method`.
    pub fn route(&self, method: &Method, path: &str) -> Result<RouteMatch, DispatchError> {
        let not_bound = || DispatchError::RouteNotBound {
            method: method.to_string(),
            path: path.to_string(),
        };

        let methods = self.methods.read();
        let routes = methods.get(method).ok_or_else(not_bound)?;
        let matched = routes.router.at(path).map_err(|_| not_bound())?;

        let params = matched
            .params
            .iter()
            .map(|(name, value)| {
                let value = urlencoding::decode(value)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                (name.to_string(), value)
            })
            .collect();

        Ok(RouteMatch {
            binding: Arc::clone(matched.value),
            params,
        })
    }

    /// Number of bound routes
    pub fn len(&self) -> usize {
        self.methods.read().values().map(|r| r.bindings.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteBinder for RouteTable {
    /// Rebuild the tries of every affected method, then swap them in.
    /// Nothing changes if any insertion fails.
    fn bind(&self, routes: &[RouteBinding]) -> Result<(), RegistryError> {
        let mut by_method: HashMap<&Method, Vec<RouteBinding>> = HashMap::new();
        for binding in routes {
            by_method
                .entry(&binding.key.method)
                .or_default()
                .push(binding.clone());
        }

        let mut methods = self.methods.write();
        let mut rebuilt = Vec::with_capacity(by_method.len());
        for (method, added) in by_method {
            let next = match methods.get(method) {
                Some(current) => current.extended(&added)?,
                None => MethodRoutes::default().extended(&added)?,
            };
            rebuilt.push((method.clone(), next));
        }

        for (method, next) in rebuilt {
            debug!(method = %method, routes = next.bindings.len(), "router rebuilt");
            methods.insert(method, next);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RouteKey;

    fn binding(method: Method, path: &str, config: &str) -> RouteBinding {
        RouteBinding {
            key: RouteKey::new(method, path),
            default_configuration: config.to_string(),
        }
    }

    #[test]
    fn test_route_with_parameters() {
        let table = RouteTable::new();
        table
            .bind(&[binding(Method::GET, "/ships/{class}/{designation}", "fleet")])
            .unwrap();

        let matched = table.route(&Method::GET, "/ships/Galaxy/Enterprise").unwrap();
        assert_eq!(matched.binding.default_configuration, "fleet");
        assert_eq!(
            matched.params,
            vec![
                ("class".to_string(), "Galaxy".to_string()),
                ("designation".to_string(), "Enterprise".to_string()),
            ]
        );
    }

    #[test]
    fn test_params_are_percent_decoded() {
        let table = RouteTable::new();
        table
            .bind(&[binding(Method::GET, "/names/{name}", "people")])
            .unwrap();

        let matched = table.route(&Method::GET, "/names/Jean-Luc%20Picard").unwrap();
        assert_eq!(matched.params[0].1, "Jean-Luc Picard");
    }

    #[test]
    fn test_catch_all_route() {
        let table = RouteTable::new();
        table
            .bind(&[binding(Method::GET, "/files/{*path}", "files")])
            .unwrap();

        let matched = table.route(&Method::GET, "/files/a/b/c.txt").unwrap();
        assert_eq!(matched.params[0], ("path".to_string(), "a/b/c.txt".to_string()));
    }

    #[test]
    fn test_unbound_method_or_path() {
        let table = RouteTable::new();
        table.bind(&[binding(Method::GET, "/ping", "alpha")]).unwrap();

        assert!(matches!(
            table.route(&Method::POST, "/ping"),
            Err(DispatchError::RouteNotBound { .. })
        ));
        assert!(matches!(
            table.route(&Method::GET, "/pong"),
            Err(DispatchError::RouteNotBound { .. })
        ));
    }

    #[test]
    fn test_methods_are_independent() {
        let table = RouteTable::new();
        table
            .bind(&[
                binding(Method::GET, "/ping", "alpha"),
                binding(Method::POST, "/ping", "beta"),
            ])
            .unwrap();

        assert_eq!(table.len(), 2);
        let get = table.route(&Method::GET, "/ping").unwrap();
        let post = table.route(&Method::POST, "/ping").unwrap();
        assert_eq!(get.binding.default_configuration, "alpha");
        assert_eq!(post.binding.default_configuration, "beta");
    }

    #[test]
    fn test_incremental_binds_keep_existing_routes() {
        let table = RouteTable::new();
        table.bind(&[binding(Method::GET, "/a", "first")]).unwrap();
        table.bind(&[binding(Method::GET, "/b", "second")]).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.route(&Method::GET, "/a").unwrap().binding.default_configuration,
            "first"
        );
        assert_eq!(
            table.route(&Method::GET, "/b").unwrap().binding.default_configuration,
            "second"
        );
    }

    #[test]
    fn test_conflicting_bind_changes_nothing() {
        let table = RouteTable::new();
        table
            .bind(&[binding(Method::GET, "/ships/{class}", "alpha")])
            .unwrap();

        let err = table
            .bind(&[
                binding(Method::DELETE, "/other", "beta"),
                binding(Method::GET, "/ships/{name}", "beta"),
            ])
            .unwrap_err();
        assert!(matches!(err, RegistryError::RouteConflict { .. }));

        assert_eq!(table.len(), 1);
        assert!(table.route(&Method::DELETE, "/other").is_err());
        assert!(table.route(&Method::GET, "/ships/Galaxy").is_ok());
    }
}
