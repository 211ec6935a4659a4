//! Registry - Views, actions, and return handlers by stable identifier
//!
//! Tokens only ever name things; the registry is the sole place where a name
//! becomes code. A name the registry does not know is a protocol violation.

use crate::engine::{ActionContext, RenderContext};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use waystack_core::{ActionId, Context, HandlerId, NavError, NavResult, Value, ViewId};

/// Renders the top frame. Receives no navigation capability.
pub type ViewFn<Req, Out> =
    Arc<dyn Fn(&RenderContext<'_>, &Req) -> NavResult<Out> + Send + Sync>;

/// Mutates the top context or performs one navigation primitive.
pub type ActionFn<Req> = Arc<dyn Fn(&mut ActionContext<'_>, &Req) -> NavResult<()> + Send + Sync>;

/// Runs on the caller's context when a called frame returns:
/// `(caller context, returned value, return context)`.
pub type ReturnFn = Arc<dyn Fn(&mut Context, &Value, &Context) -> NavResult<()> + Send + Sync>;

/// Name lookups needed while applying primitives and minting links.
pub trait Catalog {
    fn has_view(&self, view: &ViewId) -> bool;
    fn has_action(&self, id: &ActionId) -> bool;
    fn return_handler(&self, id: &HandlerId) -> Option<&ReturnFn>;
}

pub struct Registry<Req, Out = String> {
    views: HashMap<ViewId, ViewFn<Req, Out>>,
    actions: HashMap<ActionId, ActionFn<Req>>,
    handlers: HashMap<HandlerId, ReturnFn>,
}

impl<Req, Out> Registry<Req, Out> {
    pub fn new() -> Self {
        Self {
            views: HashMap::new(),
            actions: HashMap::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register a render function.
    pub fn view<F>(mut self, id: impl Into<ViewId>, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>, &Req) -> NavResult<Out> + Send + Sync + 'static,
    {
        self.views.insert(id.into(), Arc::new(render));
        self
    }

    /// Register an action callback.
    pub fn action<F>(mut self, id: impl Into<ActionId>, act: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>, &Req) -> NavResult<()> + Send + Sync + 'static,
    {
        self.actions.insert(id.into(), Arc::new(act));
        self
    }

    /// Register a return handler.
    pub fn on_return<F>(mut self, id: impl Into<HandlerId>, handler: F) -> Self
    where
        F: Fn(&mut Context, &Value, &Context) -> NavResult<()> + Send + Sync + 'static,
    {
        self.handlers.insert(id.into(), Arc::new(handler));
        self
    }

    pub fn resolve_view(&self, id: &ViewId) -> NavResult<&ViewFn<Req, Out>> {
        self.views
            .get(id)
            .ok_or_else(|| NavError::ProtocolViolation(format!("unknown view `{id}`")))
    }

    pub fn resolve_action(&self, id: &ActionId) -> NavResult<&ActionFn<Req>> {
        self.actions
            .get(id)
            .ok_or_else(|| NavError::ProtocolViolation(format!("unknown action `{id}`")))
    }
}

impl<Req, Out> Catalog for Registry<Req, Out> {
    fn has_view(&self, view: &ViewId) -> bool {
        self.views.contains_key(view)
    }

    fn has_action(&self, id: &ActionId) -> bool {
        self.actions.contains_key(id)
    }

    fn return_handler(&self, id: &HandlerId) -> Option<&ReturnFn> {
        self.handlers.get(id)
    }
}

impl<Req, Out> Default for Registry<Req, Out> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Out> fmt::Debug for Registry<Req, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("views", &self.views.len())
            .field("actions", &self.actions.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
