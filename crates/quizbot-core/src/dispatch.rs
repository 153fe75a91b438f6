//! Command name → handler table, with role checks as a decorator.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{
    domain::Role, errors::Error, messaging::types::ButtonPress, security::AuthorizationGate,
    token::CommandToken, Result,
};

/// Everything a handler gets for one button press.
#[derive(Clone, Debug)]
pub struct CommandContext {
    pub press: ButtonPress,
    pub token: CommandToken,
}

/// What the router sends back as the button acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ack {
    Silent,
    Notice(String),
}

impl Ack {
    pub fn notice(text: impl Into<String>) -> Self {
        Ack::Notice(text.into())
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Ack::Silent => None,
            Ack::Notice(t) => Some(t.as_str()),
        }
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: CommandContext) -> Result<Ack>;
}

/// Adapts an async closure into a `CommandHandler`.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Ack>> + Send + 'static,
{
    async fn handle(&self, ctx: CommandContext) -> Result<Ack> {
        (self.0)(ctx).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Ack>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Runs `inner` only when the gate grants `required` to the caller.
pub struct RequireRole {
    gate: Arc<dyn AuthorizationGate>,
    required: Role,
    inner: Arc<dyn CommandHandler>,
}

impl RequireRole {
    pub fn new(
        gate: Arc<dyn AuthorizationGate>,
        required: Role,
        inner: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            gate,
            required,
            inner,
        }
    }
}

#[async_trait]
impl CommandHandler for RequireRole {
    async fn handle(&self, ctx: CommandContext) -> Result<Ack> {
        if !self.gate.allows(ctx.press.user_id, self.required).await? {
            tracing::info!(
                user = ctx.press.user_id.0,
                command = %ctx.token.name,
                required = ?self.required,
                "command denied"
            );
            return Err(Error::PermissionDenied);
        }
        self.inner.handle(ctx).await
    }
}

pub struct DispatchTable {
    gate: Arc<dyn AuthorizationGate>,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl DispatchTable {
    pub fn new(gate: Arc<dyn AuthorizationGate>) -> Self {
        Self {
            gate,
            handlers: HashMap::new(),
        }
    }

    /// Register without any role check.
    pub fn register(&mut self, name: &str, handler: Arc<dyn CommandHandler>) {
        if self.handlers.insert(name.to_string(), handler).is_some() {
            tracing::warn!(command = name, "command handler registered twice");
        }
    }

    pub fn register_gated(&mut self, name: &str, required: Role, handler: Arc<dyn CommandHandler>) {
        let guarded = RequireRole::new(self.gate.clone(), required, handler);
        self.register(name, Arc::new(guarded));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub async fn dispatch(&self, ctx: CommandContext) -> Result<Ack> {
        let handler = self
            .handlers
            .get(&ctx.token.name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("command `{}`", ctx.token.name)))?;
        handler.handle(ctx).await
    }
}
