//! # Navigator: one token in, one dispatch, one render, tokens out
//!
//! ```text
//! token ──resolve──▶ envelope ──open──▶ bytes ──decode──▶ Transfer { stack, action }
//!                                                             │
//!                                            dispatch (exactly one action)
//!                                                             │
//!             links ◀──publish── seal ◀── encode ◀── render(top frame)
//! ```
//!
//! Navigation primitives live on [`ActionContext`] only. Views get a
//! [`RenderContext`], which can read the stack and mint links but has no way
//! to change it.

use crate::governor::SizeGovernor;
use crate::link::Link;
use crate::registry::{Catalog, Registry};
use crate::store::BlobStore;
use crate::transport::{StagedWrite, Transport};
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use waystack_core::{
    Action, ActionId, AeadCipher, CallStack, Codec, Context, Frame, GlobalKey, HandlerId, Keying,
    NavConfig, NavError, NavResult, SessionKeys, Signer, Transfer, Value, ViewId,
};

// ============== Request / Response ==============

/// What the host extracted from an inbound request.
#[derive(Debug, Clone, Default)]
pub struct Inbound {
    /// `None` on a first visit.
    pub token: Option<String>,
    /// Submitted form values, merged into the top context for `Invoke` actions.
    pub fields: Context,
    /// Session identifier, needed for per-session keys.
    pub session: Option<String>,
}

impl Inbound {
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn fields(mut self, fields: Context) -> Self {
        self.fields = fields;
        self
    }

    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrigin {
    /// No token: the entry view on a fresh stack.
    Fresh,
    /// A token was resolved and its action dispatched.
    Resumed,
    /// The token failed verification or decoding; rendered from a fresh stack.
    Reset { reason: &'static str },
}

impl PageOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            PageOrigin::Fresh => "fresh",
            PageOrigin::Resumed => "resumed",
            PageOrigin::Reset { .. } => "reset",
        }
    }
}

/// A rendered response.
#[derive(Debug)]
pub struct Page<Out> {
    pub output: Out,
    pub origin: PageOrigin,
    pub view: ViewId,
    pub depth: usize,
    /// Frames dropped by the size governor while publishing this page.
    pub evicted: usize,
}

/// The stack after dispatch, with the number of top frames it touched.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub stack: CallStack,
    pub protected: usize,
}

/// A rendered view plus the database writes its links staged.
#[derive(Debug)]
pub struct Rendered<Out> {
    pub output: Out,
    pub view: ViewId,
    pub depth: usize,
    pub evicted: usize,
    pub staged: Vec<StagedWrite>,
}

// ============== Action Context ==============

/// Handed to action callbacks. Owns the only route to the navigation primitives.
pub struct ActionContext<'a> {
    stack: &'a mut CallStack,
    catalog: &'a dyn Catalog,
    primitive: Option<&'static str>,
    /// Lowest stack index changed by this dispatch.
    low_water: usize,
}

impl<'a> ActionContext<'a> {
    fn new(stack: &'a mut CallStack, catalog: &'a dyn Catalog) -> Self {
        let low_water = stack.len() - 1;
        Self {
            stack,
            catalog,
            primitive: None,
            low_water,
        }
    }

    pub fn context(&self) -> &Context {
        &self.stack.top().context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.stack.top_mut().context
    }

    pub fn view(&self) -> &ViewId {
        &self.stack.top().view
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Replace the current frame. Depth is unchanged and the replaced frame
    /// cannot be returned to.
    pub fn goto(&mut self, view: impl Into<ViewId>, context: Context) -> NavResult<()> {
        let view = view.into();
        self.check_view(&view)?;
        self.claim("goto")?;
        self.stack.replace_top(Frame::new(view, context));
        Ok(())
    }

    /// Push a new frame. When it returns, `on_return` runs against the
    /// current frame with the returned value and `return_context`.
    pub fn call(
        &mut self,
        view: impl Into<ViewId>,
        context: Context,
        on_return: Option<HandlerId>,
        return_context: Context,
    ) -> NavResult<()> {
        let view = view.into();
        self.check_view(&view)?;
        if let Some(handler) = &on_return {
            if self.catalog.return_handler(handler).is_none() {
                return Err(NavError::ProtocolViolation(format!(
                    "unknown return handler `{handler}`"
                )));
            }
        }
        self.claim("call")?;
        self.stack
            .push(Frame::called(view, context, on_return, return_context));
        Ok(())
    }

    /// Pop the current frame and hand `value` to the caller's return handler.
    pub fn ret(&mut self, value: impl Into<Value>) -> NavResult<()> {
        let value = value.into();
        self.claim("return")?;
        if self.stack.len() <= 1 {
            return Err(NavError::EmptyStack);
        }

        let catalog = self.catalog;
        let handler = match &self.stack.top().on_return {
            Some(id) => Some(catalog.return_handler(id).ok_or_else(|| {
                NavError::ProtocolViolation(format!("unknown return handler `{id}`"))
            })?),
            None => None,
        };

        let popped = self.stack.pop()?;
        self.low_water = self.low_water.min(self.stack.len() - 1);
        if let Some(handler) = handler {
            handler(
                &mut self.stack.top_mut().context,
                &value,
                &popped.return_context,
            )?;
        }
        Ok(())
    }

    /// Explicitly leave the stack as it is.
    pub fn noop(&mut self) -> NavResult<()> {
        self.claim("noop")
    }

    fn claim(&mut self, name: &'static str) -> NavResult<()> {
        if let Some(previous) = self.primitive {
            return Err(NavError::ProtocolViolation(format!(
                "`{name}` after `{previous}`: one navigation primitive per request"
            )));
        }
        self.primitive = Some(name);
        Ok(())
    }

    fn check_view(&self, view: &ViewId) -> NavResult<()> {
        if self.catalog.has_view(view) {
            Ok(())
        } else {
            Err(NavError::ProtocolViolation(format!("unknown view `{view}`")))
        }
    }

    fn protected(&self) -> usize {
        self.stack.len() - self.low_water
    }
}

impl fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("view", self.view())
            .field("depth", &self.depth())
            .field("primitive", &self.primitive)
            .finish()
    }
}

// ============== Render Context ==============

struct Publisher<'a> {
    codec: &'a Codec,
    signer: &'a Signer,
    transport: &'a Transport,
    token_key: &'a str,
    session: Option<&'a str>,
    staged: RefCell<Vec<StagedWrite>>,
}

/// Handed to views. Read-only access to the stack plus link minting.
pub struct RenderContext<'a> {
    stack: &'a CallStack,
    catalog: &'a dyn Catalog,
    publisher: Publisher<'a>,
}

impl<'a> RenderContext<'a> {
    pub fn context(&self) -> &Context {
        &self.stack.top().context
    }

    pub fn view(&self) -> &ViewId {
        &self.stack.top().view
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &CallStack {
        self.stack
    }

    /// Link that re-renders the current state.
    pub fn link_noop(&self) -> NavResult<Link> {
        self.link(Action::Noop)
    }

    /// Link that runs a registered action.
    pub fn link_action(&self, action: impl Into<ActionId>, overrides: Context) -> NavResult<Link> {
        let action = action.into();
        if !self.catalog.has_action(&action) {
            return Err(NavError::ProtocolViolation(format!(
                "link to unknown action `{action}`"
            )));
        }
        self.link(Action::Invoke { action, overrides })
    }

    pub fn link_goto(&self, view: impl Into<ViewId>, context: Context) -> NavResult<Link> {
        let view = self.checked_view(view.into())?;
        self.link(Action::Goto { view, context })
    }

    pub fn link_call(
        &self,
        view: impl Into<ViewId>,
        context: Context,
        on_return: Option<HandlerId>,
        return_context: Context,
    ) -> NavResult<Link> {
        let view = self.checked_view(view.into())?;
        if let Some(handler) = &on_return {
            if self.catalog.return_handler(handler).is_none() {
                return Err(NavError::ProtocolViolation(format!(
                    "link to unknown return handler `{handler}`"
                )));
            }
        }
        self.link(Action::Call {
            view,
            context,
            on_return,
            return_context,
        })
    }

    pub fn link_return(&self, value: impl Into<Value>) -> NavResult<Link> {
        self.link(Action::Return {
            value: value.into(),
        })
    }

    /// Encode, seal, and publish "apply `action` to this stack".
    pub fn link(&self, action: Action) -> NavResult<Link> {
        let p = &self.publisher;
        let bytes = p.codec.encode_transfer_parts(self.stack, &action)?;
        let envelope = p.signer.seal(&bytes, p.session)?;
        let token = p
            .transport
            .publish(&envelope, &mut p.staged.borrow_mut());
        Ok(Link::new(p.token_key, token))
    }

    fn checked_view(&self, view: ViewId) -> NavResult<ViewId> {
        if self.catalog.has_view(&view) {
            Ok(view)
        } else {
            Err(NavError::ProtocolViolation(format!(
                "link to unknown view `{view}`"
            )))
        }
    }

    fn into_staged(self) -> Vec<StagedWrite> {
        self.publisher.staged.into_inner()
    }
}

// ============== Navigator ==============

/// Signing material used when no explicit [`Signer`] is supplied.
#[derive(Clone, Default)]
pub struct Keys {
    /// Global key, or the master secret for per-session derivation.
    pub secret: Vec<u8>,
    /// Required when `encrypt = true`.
    pub cipher_key: Option<Vec<u8>>,
}

impl Keys {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            cipher_key: None,
        }
    }

    pub fn with_cipher_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.cipher_key = Some(key.into());
        self
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("secret", &"<redacted>")
            .field("cipher_key", &self.cipher_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub struct NavigatorBuilder<Req, Out> {
    registry: Registry<Req, Out>,
    config: NavConfig,
    keys: Option<Keys>,
    signer: Option<Signer>,
    store: Option<Arc<dyn BlobStore>>,
    entry: Option<Frame>,
}

impl<Req, Out> NavigatorBuilder<Req, Out> {
    pub fn config(mut self, config: NavConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the signer from `config.keying` and `config.encrypt`.
    pub fn keys(mut self, keys: Keys) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Use a fully custom signer instead of [`Keys`].
    pub fn signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The view and context a first visit starts from.
    pub fn entry(mut self, view: impl Into<ViewId>, context: Context) -> Self {
        self.entry = Some(Frame::new(view, context));
        self
    }

    pub fn build(self) -> NavResult<Navigator<Req, Out>> {
        self.config.validate()?;

        let entry = self
            .entry
            .ok_or_else(|| NavError::Config("no entry view".into()))?;
        if !self.registry.has_view(&entry.view) {
            return Err(NavError::Config(format!(
                "entry view `{}` is not registered",
                entry.view
            )));
        }

        let signer = match (self.signer, self.keys) {
            (Some(signer), _) => signer,
            (None, Some(keys)) => signer_from_keys(&self.config, &keys)?,
            (None, None) => return Err(NavError::Config("no signing keys".into())),
        };
        if self.config.encrypt && !signer.encrypts() {
            return Err(NavError::Config(
                "encrypt = true but the signer has no cipher".into(),
            ));
        }

        let codec = Codec::new(self.config.max_inflated_bytes);
        let transport = Transport::new(&self.config, self.store)?;
        let governor = SizeGovernor::new(self.config.stack_ceiling, codec);

        Ok(Navigator {
            registry: Arc::new(self.registry),
            config: self.config,
            codec,
            signer,
            transport,
            governor,
            entry,
        })
    }
}

fn signer_from_keys(config: &NavConfig, keys: &Keys) -> NavResult<Signer> {
    let signer = match config.keying {
        Keying::Global => Signer::new(GlobalKey::new(&keys.secret)?),
        Keying::PerSession => Signer::new(SessionKeys::new(&keys.secret)?),
    };
    match (&keys.cipher_key, config.encrypt) {
        (Some(key), true) => Ok(signer.with_cipher(AeadCipher::new(key)?)),
        (None, true) => Err(NavError::Config(
            "encrypt = true requires a cipher key".into(),
        )),
        (_, false) => Ok(signer),
    }
}

/// The navigation engine. Cheap to share behind an `Arc`; holds no per-request state.
pub struct Navigator<Req, Out = String> {
    registry: Arc<Registry<Req, Out>>,
    config: NavConfig,
    codec: Codec,
    signer: Signer,
    transport: Transport,
    governor: SizeGovernor,
    entry: Frame,
}

impl<Req, Out> Navigator<Req, Out> {
    pub fn builder(registry: Registry<Req, Out>) -> NavigatorBuilder<Req, Out> {
        NavigatorBuilder {
            registry,
            config: NavConfig::default(),
            keys: None,
            signer: None,
            store: None,
            entry: None,
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The stack a first visit starts with.
    pub fn fresh_stack(&self) -> CallStack {
        CallStack::new(self.entry.clone())
    }

    /// Resolve, verify, and decode a token without dispatching it.
    pub async fn load(&self, token: &str, session: Option<&str>) -> NavResult<Transfer> {
        let envelope = self.transport.resolve(token).await?;
        let bytes = self.signer.open(&envelope, session)?;
        self.codec.decode_transfer(&bytes)
    }

    /// Apply exactly one action to the transferred stack.
    pub fn dispatch(&self, transfer: Transfer, fields: &Context, req: &Req) -> NavResult<Dispatched> {
        let Transfer { mut stack, action } = transfer;
        let span = tracing::info_span!(
            "dispatch",
            waystack.action = action.label(),
            waystack.view = %stack.top().view,
            waystack.depth = stack.len()
        );
        let _guard = span.enter();

        let mut ctx = ActionContext::new(&mut stack, self.registry.as_ref());
        match action {
            Action::Noop => ctx.noop()?,
            Action::Invoke { action, overrides } => {
                let act = self.registry.resolve_action(&action)?;
                ctx.context_mut().merge(fields);
                ctx.context_mut().merge(&overrides);
                act(&mut ctx, req)?;
            }
            Action::Goto { view, context } => ctx.goto(view, context)?,
            Action::Call {
                view,
                context,
                on_return,
                return_context,
            } => ctx.call(view, context, on_return, return_context)?,
            Action::Return { value } => ctx.ret(value)?,
        }
        let protected = ctx.protected();

        tracing::debug!(
            waystack.view = %stack.top().view,
            waystack.depth = stack.len(),
            protected,
            "dispatch complete"
        );
        Ok(Dispatched { stack, protected })
    }

    /// Fit the stack to the size ceiling and render its top frame.
    pub fn render(
        &self,
        dispatched: Dispatched,
        session: Option<&str>,
        req: &Req,
    ) -> NavResult<Rendered<Out>> {
        let governed = self.governor.fit(dispatched.stack, dispatched.protected)?;
        let stack = &governed.stack;
        let view_id = stack.top().view.clone();
        let view = self.registry.resolve_view(&view_id)?;

        let ctx = RenderContext {
            stack,
            catalog: self.registry.as_ref(),
            publisher: Publisher {
                codec: &self.codec,
                signer: &self.signer,
                transport: &self.transport,
                token_key: &self.config.token_key,
                session,
                staged: RefCell::new(Vec::new()),
            },
        };
        let output = view(&ctx, req)?;
        let staged = ctx.into_staged();

        Ok(Rendered {
            output,
            view: view_id,
            depth: stack.len(),
            evicted: governed.evicted,
            staged,
        })
    }

    /// Run one request end to end.
    ///
    /// Signature and codec failures restart from a fresh stack; every other
    /// error is returned for the host to turn into a response.
    pub async fn handle(&self, inbound: Inbound, req: &Req) -> NavResult<Page<Out>> {
        let span = tracing::info_span!(
            "navigate",
            waystack.backend = self.transport.kind().as_str(),
            waystack.token_len = inbound.token.as_ref().map_or(0, String::len)
        );

        async move {
            let session = inbound.session.as_deref();
            let (transfer, origin) = match inbound.token.as_deref() {
                None => (self.fresh_transfer(), PageOrigin::Fresh),
                Some(token) => match self.load(token, session).await {
                    Ok(transfer) => (transfer, PageOrigin::Resumed),
                    Err(e) if e.resets_session() => {
                        tracing::warn!(error = %e, "rejected state token, starting fresh");
                        (self.fresh_transfer(), PageOrigin::Reset { reason: e.kind() })
                    }
                    Err(e) => return Err(e),
                },
            };

            let rendered = {
                let dispatched = self.dispatch(transfer, &inbound.fields, req)?;
                self.render(dispatched, session, req)?
            };
            let Rendered {
                output,
                view,
                depth,
                evicted,
                staged,
            } = rendered;
            self.transport.flush(staged).await?;

            Ok(Page {
                output,
                origin,
                view,
                depth,
                evicted,
            })
        }
        .instrument(span)
        .await
    }

    fn fresh_transfer(&self) -> Transfer {
        Transfer {
            stack: self.fresh_stack(),
            action: Action::Noop,
        }
    }
}

impl<Req, Out> fmt::Debug for Navigator<Req, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("registry", &self.registry)
            .field("transport", &self.transport)
            .field("entry", &self.entry.view)
            .finish_non_exhaustive()
    }
}
