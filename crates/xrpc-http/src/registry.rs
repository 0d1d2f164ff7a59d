//! Method name to handler mapping for the server side.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use xrpc_model::{Fault, MethodCall, Value};

/// The future every handler resolves to.
pub type HandlerFuture = BoxFuture<'static, Result<Value, Fault>>;

type Handler = Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;
type FallbackHandler = Arc<dyn Fn(MethodCall) -> HandlerFuture + Send + Sync>;

/// Registered XML-RPC methods plus an optional handler for unknown names.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Handler>,
    not_found: Option<FallbackHandler>,
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.method_names())
            .field("not_found", &self.not_found.as_ref().map(|_| "..."))
            .finish()
    }
}

impl MethodRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        let boxed: Handler =
            Arc::new(move |params| -> HandlerFuture { Box::pin(handler(params)) });
        self.methods.insert(name.into(), boxed);
    }

    /// Builder form of [`MethodRegistry::register`].
    #[must_use]
    pub fn with_method<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        self.register(name, handler);
        self
    }

    /// Handle calls to names with no registered handler.
    pub fn set_not_found<F, Fut>(&mut self, handler: F)
    where
        F: Fn(MethodCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        let boxed: FallbackHandler =
            Arc::new(move |call| -> HandlerFuture { Box::pin(handler(call)) });
        self.not_found = Some(boxed);
    }

    /// Whether `name` has a handler.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, sorted.
    #[must_use]
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Start the handler for `call`, or `None` if nothing can serve it.
    #[must_use]
    pub fn dispatch(&self, call: MethodCall) -> Option<HandlerFuture> {
        if let Some(handler) = self.methods.get(&call.name) {
            tracing::debug!(method = %call.name, params = call.params.len(), "dispatching call");
            return Some(handler(call.params));
        }
        self.not_found.as_ref().map(|fallback| {
            tracing::debug!(method = %call.name, "dispatching call to not-found handler");
            fallback(call)
        })
    }
}
