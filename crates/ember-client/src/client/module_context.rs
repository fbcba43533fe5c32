// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::mpsc::Sender;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use ember_xmpp::{
    IDProvider, LoginStatus, StanzaTree, SystemTimeProvider, TimeProvider, UUIDProvider, UserJid,
};

use crate::ServerConfig;

/// State shared between the `ConnectionManager`, its modules and their IO-thread halves.
#[derive(Clone)]
pub struct ModuleContext {
    pub(super) inner: Arc<ModuleContextInner>,
}

pub(super) struct ModuleContextInner {
    pub config: RwLock<ServerConfig>,
    pub jid: RwLock<Option<UserJid>>,
    pub login_status: RwLock<LoginStatus>,
    pub outbound: RwLock<Option<Sender<StanzaTree>>>,
    pub id_provider: Arc<dyn IDProvider>,
    pub time_provider: Arc<dyn TimeProvider>,
}

impl ModuleContext {
    pub(crate) fn new(
        config: ServerConfig,
        id_provider: Arc<dyn IDProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        ModuleContext {
            inner: Arc::new(ModuleContextInner {
                config: RwLock::new(config),
                jid: RwLock::new(None),
                login_status: RwLock::new(LoginStatus::NotStarted),
                outbound: RwLock::new(None),
                id_provider,
                time_provider,
            }),
        }
    }

    /// Queues `stanza` on the IO thread. Returns false if there is no session to send it on.
    pub(crate) fn send_stanza(&self, stanza: StanzaTree) -> bool {
        let Some(outbound) = &*self.inner.outbound.read() else {
            debug!("Dropping stanza. No active session.");
            return false;
        };
        outbound.send(stanza).is_ok()
    }

    pub(crate) fn generate_id(&self) -> String {
        self.inner.id_provider.new_id()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.inner.time_provider.now()
    }

    pub(crate) fn jid(&self) -> Option<UserJid> {
        self.inner.jid.read().clone()
    }

    pub(crate) fn login_status(&self) -> LoginStatus {
        *self.inner.login_status.read()
    }

    pub(crate) fn is_logged_in(&self) -> bool {
        self.login_status() == LoginStatus::LoggedIn
    }

    pub(crate) fn config(&self) -> ServerConfig {
        self.inner.config.read().clone()
    }

    pub(crate) fn muc_domain(&self) -> String {
        self.inner.config.read().muc_domain()
    }

    pub(crate) fn id_provider(&self) -> Arc<dyn IDProvider> {
        self.inner.id_provider.clone()
    }

    pub(super) fn set_config(&self, config: ServerConfig) {
        *self.inner.config.write() = config;
    }

    pub(super) fn set_jid(&self, jid: Option<UserJid>) {
        *self.inner.jid.write() = jid;
    }

    pub(super) fn set_login_status(&self, status: LoginStatus) {
        *self.inner.login_status.write() = status;
    }

    pub(super) fn set_outbound(&self, outbound: Option<Sender<StanzaTree>>) {
        *self.inner.outbound.write() = outbound;
    }
}

impl Default for ModuleContext {
    fn default() -> Self {
        ModuleContext::new(
            ServerConfig::default(),
            Arc::new(UUIDProvider::new()),
            Arc::new(SystemTimeProvider::default()),
        )
    }
}

#[cfg(any(test, feature = "test"))]
impl ModuleContext {
    /// A context that looks logged in and whose outbound queue is handed to the caller.
    pub fn connected_for_testing(
        config: ServerConfig,
        jid: UserJid,
        id_provider: Arc<dyn IDProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> (Self, std::sync::mpsc::Receiver<StanzaTree>) {
        let ctx = ModuleContext::new(config, id_provider, time_provider);
        let (tx, rx) = std::sync::mpsc::channel();
        ctx.set_jid(Some(jid));
        ctx.set_login_status(LoginStatus::LoggedIn);
        ctx.set_outbound(Some(tx));
        (ctx, rx)
    }
}
