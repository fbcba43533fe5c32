// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::future::Future;

use anyhow::Result;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{info_span, Span};

use crate::UserJid;

/// Per-connection execution context. Owns the runtime that drives the transport and the
/// span all log output of the connection is recorded in.
pub struct WireContext {
    runtime: Runtime,
    span: Span,
}

impl WireContext {
    pub fn new(jid: &UserJid) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let span = info_span!("xmpp", jid = %jid);
        Ok(WireContext { runtime, span })
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Runs `future` to completion. Tasks spawned on this context make progress only while
    /// a `block_on` call is active.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }
}
