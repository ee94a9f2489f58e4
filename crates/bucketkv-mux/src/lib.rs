//! `bucketkv` HTTP method mux
//!
//! A registration front end for [`axum::Router`] that layers middleware
//! around each handler as it is registered and dispatches per HTTP method.
//!
//! Routes are collected under one lock while the service is being wired up.
//! [`MethodMux::router`] then snapshots them into an ordinary, immutable
//! `Router`: unknown paths answer 404 and registered paths answer 405 for
//! methods nothing was registered for.
//!
//! # Example
//!
//! ```ignore
//! use axum::middleware;
//! use bucketkv_mux::MethodMux;
//!
//! let mux = MethodMux::new();
//! mux.use_middleware(|route| route.layer(middleware::from_fn(log_request)));
//!
//! mux.handle("/v1/keys", list_keys, &["GET"])?;
//! mux.handle("/v1/keys/:key", put_key, &["PUT"])?;
//! mux.handle("/v1/keys/:key", delete_key, &["DELETE"])?;
//! mux.handle("/health", health, &[])?;
//!
//! axum::serve(listener, mux.router()).await?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{any, on, MethodFilter, MethodRouter};
use axum::Router;
use thiserror::Error;
use tracing::debug;

/// Errors from route registration.
#[derive(Debug, Error)]
pub enum MuxError {
    /// The pattern, or the method for the pattern, is already registered.
    #[error("multiple registrations for {pattern}{}", method_suffix(.method))]
    MultipleRegistrations {
        /// The route pattern.
        pattern: String,
        /// The conflicting method, if the conflict is per method.
        method: Option<String>,
    },

    /// The method name is not a method the router can dispatch on.
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// The pattern is not a valid route path.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// A middleware applied to each handler as it is registered.
pub type Middleware = Arc<dyn Fn(MethodRouter) -> MethodRouter + Send + Sync>;

/// What a pattern has been registered for.
enum Methods {
    /// One handler for every method.
    Any,
    /// Handlers for these methods only.
    Only(BTreeSet<String>),
}

struct Route {
    router: MethodRouter,
    methods: Methods,
}

#[derive(Default)]
struct Registry {
    middlewares: Vec<Middleware>,
    routes: BTreeMap<String, Route>,
}

/// An HTTP mux that applies middleware at registration and dispatches per
/// method.
#[derive(Default)]
pub struct MethodMux {
    registry: Mutex<Registry>,
}

impl MethodMux {
    /// Create an empty mux.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware.
    ///
    /// Middleware wraps handlers registered after it is added. The first
    /// middleware added is the outermost.
    pub fn use_middleware<F>(&self, middleware: F)
    where
        F: Fn(MethodRouter) -> MethodRouter + Send + Sync + 'static,
    {
        self.lock().middlewares.push(Arc::new(middleware));
    }

    /// Register `handler` for `pattern`.
    ///
    /// With no `methods` the handler serves every method of the pattern.
    /// Otherwise it serves the listed methods, alongside handlers registered
    /// for other methods of the same pattern.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::MultipleRegistrations`] if the pattern is already
    /// registered for every method, if it is already registered per method
    /// and `methods` is empty, or if one of `methods` is already registered.
    /// Returns [`MuxError::InvalidMethod`] and [`MuxError::InvalidPattern`]
    /// for names the router cannot use. Nothing is registered on error.
    pub fn handle<H, T>(&self, pattern: &str, handler: H, methods: &[&str]) -> Result<(), MuxError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        if !pattern.starts_with('/') {
            return Err(MuxError::InvalidPattern(pattern.to_string()));
        }
        let filters = methods
            .iter()
            .map(|name| parse_method(name))
            .collect::<Result<Vec<_>, _>>()?;

        let conflict = |method: Option<&String>| MuxError::MultipleRegistrations {
            pattern: pattern.to_string(),
            method: method.cloned(),
        };

        let mut registry = self.lock();
        match registry.routes.get(pattern) {
            Some(Route { methods: Methods::Any, .. }) => return Err(conflict(None)),
            Some(Route { methods: Methods::Only(_), .. }) if filters.is_empty() => {
                return Err(conflict(None));
            }
            Some(Route { methods: Methods::Only(taken), .. }) => {
                if let Some((name, _)) = filters.iter().find(|(name, _)| taken.contains(name)) {
                    return Err(conflict(Some(name)));
                }
            }
            None => {}
        }
        let mut seen = BTreeSet::new();
        for (name, _) in &filters {
            if !seen.insert(name) {
                return Err(conflict(Some(name)));
            }
        }

        let mut routed = match filters.split_first() {
            None => any(handler),
            Some(((_, first), rest)) => {
                let filter = rest.iter().fold(*first, |acc, (_, f)| acc.or(*f));
                on(filter, handler)
            }
        };
        // Descending, so the first middleware added ends up outermost.
        for middleware in registry.middlewares.iter().rev() {
            routed = middleware(routed);
        }

        debug!(pattern, ?methods, "registered route");
        if filters.is_empty() {
            let route = Route { router: routed, methods: Methods::Any };
            registry.routes.insert(pattern.to_string(), route);
            return Ok(());
        }
        let names = filters.into_iter().map(|(name, _)| name);
        let route = match registry.routes.remove(pattern) {
            Some(Route { router, methods: Methods::Only(mut taken) }) => {
                taken.extend(names);
                Route { router: router.merge(routed), methods: Methods::Only(taken) }
            }
            _ => Route { router: routed, methods: Methods::Only(names.collect()) },
        };
        registry.routes.insert(pattern.to_string(), route);
        Ok(())
    }

    /// Snapshot the registered routes into a router.
    #[must_use]
    pub fn router(&self) -> Router {
        let registry = self.lock();
        registry
            .routes
            .iter()
            .fold(Router::new(), |app, (pattern, route)| app.route(pattern, route.router.clone()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for MethodMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        f.debug_struct("MethodMux")
            .field("middlewares", &registry.middlewares.len())
            .field("patterns", &registry.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Formats the conflicting method, if any, for [`MuxError::MultipleRegistrations`].
fn method_suffix(method: &Option<String>) -> String {
    method.as_ref().map(|m| format!(" ({m})")).unwrap_or_default()
}

/// Parse a method name into its canonical name and router filter.
fn parse_method(name: &str) -> Result<(String, MethodFilter), MuxError> {
    let method = Method::from_bytes(name.as_bytes())
        .map_err(|_| MuxError::InvalidMethod(name.to_string()))?;
    let filter = MethodFilter::try_from(method.clone())
        .map_err(|_| MuxError::InvalidMethod(name.to_string()))?;
    Ok((method.as_str().to_string(), filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok() -> &'static str {
        "ok"
    }

    #[test]
    fn test_parse_method() {
        let (name, _) = parse_method("GET").expect("GET should parse");
        assert_eq!(name, "GET");
        assert!(matches!(parse_method("NOT A METHOD"), Err(MuxError::InvalidMethod(_))));
        // Valid token, but not a method the router can filter on
        assert!(matches!(parse_method("PURGE"), Err(MuxError::InvalidMethod(_))));
    }

    #[test]
    fn test_registration_conflicts() {
        let mux = MethodMux::new();
        mux.handle("/foo", ok, &["GET"]).expect("register GET");
        mux.handle("/foo", ok, &["POST", "PUT"]).expect("register POST and PUT");

        let err = mux.handle("/foo", ok, &["PUT"]).expect_err("PUT is taken");
        assert!(
            matches!(err, MuxError::MultipleRegistrations { method: Some(ref m), .. } if m == "PUT")
        );
        assert!(err.to_string().contains("multiple registrations"));

        let err = mux.handle("/foo", ok, &[]).expect_err("pattern is taken");
        assert!(matches!(err, MuxError::MultipleRegistrations { method: None, .. }));

        mux.handle("/bar", ok, &[]).expect("register any");
        let err = mux.handle("/bar", ok, &["GET"]).expect_err("pattern is taken");
        assert!(matches!(err, MuxError::MultipleRegistrations { .. }));

        let err = mux.handle("/baz", ok, &["GET", "GET"]).expect_err("duplicate method");
        assert!(matches!(err, MuxError::MultipleRegistrations { .. }));

        let err = mux.handle("baz", ok, &[]).expect_err("relative pattern");
        assert!(matches!(err, MuxError::InvalidPattern(_)));

        let debug = format!("{mux:?}");
        assert!(debug.contains("/foo") && debug.contains("/bar") && !debug.contains("/baz"));
    }
}
