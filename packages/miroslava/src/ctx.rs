//! Application and request contexts.
//!
//! While a request is dispatched the app, the request, `g` and the session
//! are bound to the running task, so code deep inside a view can reach them
//! through [`current_app`], [`request`], [`g`] and [`session`] without
//! threading them through every call. Binding is scoped: when a nested scope
//! ends, the outer context is visible again.

use std::{
    any::Any,
    collections::BTreeMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde_json::Value;
use thiserror::Error;

use crate::{Miroslava, request::Request};

tokio::task_local! {
    static APP_CTX: AppContext;
    static REQUEST_CTX: RequestContext;
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Working outside of application context.")]
    NoAppContext,
    #[error("Working outside of request context.")]
    NoRequestContext,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Namespace for data that lives as long as the application context.
///
/// Cloning yields another handle to the same storage.
#[derive(Clone, Default)]
pub struct AppGlobals {
    values: Arc<Mutex<BTreeMap<String, Arc<dyn Any + Send + Sync>>>>,
}

impl std::fmt::Debug for AppGlobals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppGlobals")
            .field("keys", &self.keys())
            .finish()
    }
}

impl AppGlobals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        lock(&self.values).insert(name.into(), Arc::new(value));
    }

    /// A clone of the value stored under `name`, if it has type `T`.
    #[must_use]
    pub fn get<T: Any + Clone>(&self, name: &str) -> Option<T> {
        lock(&self.values)
            .get(name)
            .and_then(|x| x.downcast_ref::<T>())
            .cloned()
    }

    #[must_use]
    pub fn get_or<T: Any + Clone>(&self, name: &str, default: T) -> T {
        self.get(name).unwrap_or(default)
    }

    /// Remove the value stored under `name`.
    ///
    /// A value of another type is left in place.
    pub fn pop<T: Any + Clone + Send + Sync>(&self, name: &str) -> Option<T> {
        let mut values = lock(&self.values);
        if !values.get(name).is_some_and(|x| x.is::<T>()) {
            return None;
        }
        let value = values.remove(name)?;
        drop(values);
        value.downcast::<T>().ok().map(Arc::unwrap_or_clone)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        lock(&self.values).contains_key(name)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        lock(&self.values).keys().cloned().collect()
    }
}

/// Simplified session: an in-memory map of JSON values that lives for one
/// request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    values: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    /// Returns the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        lock(&self.values).insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        lock(&self.values).remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        lock(&self.values).contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.values).clear();
    }
}

#[derive(Debug, Clone)]
pub struct AppContext {
    app: Arc<Miroslava>,
    g: AppGlobals,
}

impl AppContext {
    #[must_use]
    pub fn new(app: Arc<Miroslava>) -> Self {
        Self {
            app,
            g: AppGlobals::new(),
        }
    }

    #[must_use]
    pub const fn app(&self) -> &Arc<Miroslava> {
        &self.app
    }

    #[must_use]
    pub const fn g(&self) -> &AppGlobals {
        &self.g
    }

    /// Run `future` with this context bound.
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        APP_CTX.scope(self, future).await
    }

    /// Run `f` with this context bound.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        APP_CTX.sync_scope(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    app: Arc<Miroslava>,
    request: Arc<Request>,
    session: Session,
}

impl RequestContext {
    #[must_use]
    pub fn new(app: Arc<Miroslava>, request: Arc<Request>) -> Self {
        Self {
            app,
            request,
            session: Session::new(),
        }
    }

    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub const fn app(&self) -> &Arc<Miroslava> {
        &self.app
    }

    #[must_use]
    pub const fn request(&self) -> &Arc<Request> {
        &self.request
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        REQUEST_CTX.scope(self, future).await
    }

    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        REQUEST_CTX.sync_scope(self, f)
    }
}

/// # Errors
///
/// * If called outside of an application context
pub fn app_ctx() -> Result<AppContext, ContextError> {
    APP_CTX
        .try_with(Clone::clone)
        .map_err(|_| ContextError::NoAppContext)
}

/// # Errors
///
/// * If called outside of a request context
pub fn request_ctx() -> Result<RequestContext, ContextError> {
    REQUEST_CTX
        .try_with(Clone::clone)
        .map_err(|_| ContextError::NoRequestContext)
}

/// The app handling the current request.
///
/// # Errors
///
/// * If called outside of an application context
pub fn current_app() -> Result<Arc<Miroslava>, ContextError> {
    app_ctx().map(|x| x.app)
}

/// # Errors
///
/// * If called outside of an application context
pub fn g() -> Result<AppGlobals, ContextError> {
    app_ctx().map(|x| x.g)
}

/// # Errors
///
/// * If called outside of a request context
pub fn request() -> Result<Arc<Request>, ContextError> {
    request_ctx().map(|x| x.request)
}

/// # Errors
///
/// * If called outside of a request context
pub fn session() -> Result<Session, ContextError> {
    request_ctx().map(|x| x.session)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::environ::Environ;

    fn app() -> Arc<Miroslava> {
        Arc::new(Miroslava::new("ctx_tests"))
    }

    #[test_log::test]
    fn accessors_fail_outside_of_context() {
        assert_eq!(
            current_app().unwrap_err().to_string(),
            "Working outside of application context."
        );
        assert_eq!(
            request().unwrap_err().to_string(),
            "Working outside of request context."
        );
        assert!(g().is_err());
        assert!(session().is_err());
    }

    #[test_log::test]
    fn sync_scope_binds_app() {
        let name = AppContext::new(app()).sync_scope(|| current_app().map(|x| x.name()));
        assert_eq!(name.unwrap(), "ctx_tests");
        assert!(current_app().is_err());
    }

    #[test_log::test]
    fn nested_scope_restores_outer_context() {
        let outer = AppContext::new(Arc::new(Miroslava::new("outer")));
        let inner = AppContext::new(Arc::new(Miroslava::new("inner")));

        outer.sync_scope(|| {
            inner.sync_scope(|| assert_eq!(current_app().unwrap().name(), "inner"));
            assert_eq!(current_app().unwrap().name(), "outer");
        });
    }

    #[test_log::test(tokio::test)]
    async fn request_scope_exposes_request_and_session() {
        let request = Arc::new(Request::new(Environ::parse_head(b"GET /titans HTTP/1.1")).unwrap());
        let ctx = RequestContext::new(app(), request);

        ctx.scope(async {
            assert_eq!(self::request().unwrap().path(), "/titans");
            session().unwrap().insert("user", "eren");
            assert_eq!(session().unwrap().get("user"), Some(Value::from("eren")));
        })
        .await;
    }

    #[test_log::test]
    fn globals_store_typed_values() {
        let g = AppGlobals::new();
        g.insert("count", 3_u32);
        g.insert("name", "Reiner".to_string());

        assert_eq!(g.get::<u32>("count"), Some(3));
        assert_eq!(g.get::<String>("count"), None);
        assert_eq!(g.get_or("missing", 7_u8), 7);
        assert!(g.contains("name"));
        assert_eq!(g.keys(), ["count", "name"]);

        assert_eq!(g.pop::<String>("count"), None);
        assert!(g.contains("count"));
        assert_eq!(g.pop::<u32>("count"), Some(3));
        assert!(!g.contains("count"));
    }

    #[test_log::test]
    fn globals_are_shared_between_clones() {
        let g = AppGlobals::new();
        g.clone().insert("x", 1_i32);
        assert_eq!(g.get::<i32>("x"), Some(1));
    }
}
