// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use anyhow::Result;
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use ember_xmpp::{
    ConnectionError, IDProvider, IoThread, LoginStatus, LoginStatusUpdate, StanzaTree,
    TimeProvider, TransportProvider, UserJid, WireConnection, WireContext,
};

use crate::client::builder::ConnectionManagerBuilder;
use crate::client::dispatcher::StanzaDispatcher;
use crate::client::events::{LoginChanged, LoginComplete, LogoutComplete};
use crate::client::ModuleContext;
use crate::delegate::MulticastDelegate;
use crate::mods::{Module, MultiUserChat, Ping, Presence, PrivateChat, PubSub};
use crate::ServerConfig;

/// The XMPP client. Owns the IO thread of the current session and the protocol modules.
///
/// Nothing happens on the calling thread until `tick` is called. `tick` applies login status
/// changes reported by the IO thread, lets every module process what it received and fires the
/// delegates.
pub struct ConnectionManager {
    ctx: ModuleContext,
    transport_provider: TransportProvider,
    dispatcher: Arc<StanzaDispatcher>,
    io_thread: Option<IoThread>,
    status_updates: Option<Receiver<LoginStatusUpdate>>,
    last_stable_status: LoginStatus,

    ping: Ping,
    presence: Presence,
    private_chat: PrivateChat,
    multi_user_chat: MultiUserChat,
    pubsub: PubSub,

    pub on_login_complete: MulticastDelegate<LoginComplete>,
    pub on_login_changed: MulticastDelegate<LoginChanged>,
    pub on_logout_complete: MulticastDelegate<LogoutComplete>,
}

impl ConnectionManager {
    pub fn new(config: ServerConfig) -> Self {
        Self::builder().set_config(config).build()
    }

    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ServerConfig,
        transport_provider: TransportProvider,
        id_provider: Arc<dyn IDProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let ctx = ModuleContext::new(config, id_provider, time_provider);

        let ping = Ping::new(ctx.clone());
        let presence = Presence::new(ctx.clone());
        let private_chat = PrivateChat::new(ctx.clone());
        let multi_user_chat = MultiUserChat::new(ctx.clone());
        let pubsub = PubSub::new();

        let dispatcher = Arc::new(StanzaDispatcher::new(vec![
            ping.stanza_handler(),
            presence.stanza_handler(),
            private_chat.stanza_handler(),
            multi_user_chat.stanza_handler(),
            pubsub.stanza_handler(),
        ]));

        ConnectionManager {
            ctx,
            transport_provider,
            dispatcher,
            io_thread: None,
            status_updates: None,
            last_stable_status: LoginStatus::LoggedOut,
            ping,
            presence,
            private_chat,
            multi_user_chat,
            pubsub,
            on_login_complete: MulticastDelegate::new(),
            on_login_changed: MulticastDelegate::new(),
            on_logout_complete: MulticastDelegate::new(),
        }
    }
}

impl ConnectionManager {
    /// Replaces the server configuration. Only possible while logged out.
    pub fn set_server(&mut self, config: ServerConfig) -> bool {
        match self.login_status() {
            LoginStatus::NotStarted | LoginStatus::LoggedOut => {
                self.ctx.set_config(config);
                true
            }
            status => {
                warn!("SetServer ignored. Login status is {}.", status);
                false
            }
        }
    }

    pub fn server(&self) -> ServerConfig {
        self.ctx.config()
    }

    /// Starts a new session for `user_id@<domain>`. Returns false if a session is already active
    /// or being set up. The outcome is reported through `on_login_complete`.
    pub fn login(&mut self, user_id: &str, password: impl Into<String>) -> bool {
        let status = self.login_status();
        match status {
            LoginStatus::NotStarted | LoginStatus::LoggedOut => (),
            LoginStatus::ProcessingLogin
            | LoginStatus::ProcessingLogout
            | LoginStatus::LoggedIn => {
                warn!("Login ignored. Login status is {}.", status);
                return false;
            }
        }

        if let Some(stale_thread) = self.io_thread.take() {
            debug!("Stopping stale XMPP thread.");
            drop(stale_thread);
        }
        self.status_updates = None;

        let config = self.ctx.config();
        let jid = UserJid::new(
            user_id,
            config.domain.as_str(),
            UserJid::create_resource(&config.resource_parts()),
        );
        if !jid.is_valid() {
            warn!("Login failed. Invalid JID {}.", jid);
            return false;
        }

        info!("Logging in as {}", jid);

        if let Err(err) = self.start_io_thread(&config, jid.clone(), password.into()) {
            error!("Could not start XMPP thread. {:?}", err);
            self.on_login_complete.broadcast(&LoginComplete {
                user_jid: jid,
                success: false,
                error: Some(ConnectionError::Generic {
                    msg: err.to_string(),
                }),
            });
            return false;
        }

        self.ctx.set_login_status(LoginStatus::ProcessingLogin);
        true
    }

    /// Ends the current session. The outcome is reported through `on_logout_complete`.
    pub fn logout(&mut self) -> bool {
        let status = self.login_status();
        match status {
            LoginStatus::NotStarted | LoginStatus::LoggedOut => {
                debug!("Logout ignored. Already logged out.");
                return false;
            }
            LoginStatus::ProcessingLogout => {
                warn!("Logout ignored. Logout is already in progress.");
                return false;
            }
            LoginStatus::ProcessingLogin | LoginStatus::LoggedIn => (),
        }

        let Some(io_thread) = &self.io_thread else {
            warn!("Logout ignored. No XMPP thread.");
            return false;
        };

        info!("Logging out {}", self.ctx.jid().unwrap_or_default());
        io_thread.stop();
        true
    }

    pub fn login_status(&self) -> LoginStatus {
        self.ctx.login_status()
    }

    pub fn user_jid(&self) -> Option<UserJid> {
        self.ctx.jid()
    }

    /// Queues a raw stanza on the current session.
    pub fn send_stanza(&self, stanza: StanzaTree) -> bool {
        if !self.ctx.is_logged_in() {
            warn!("SendStanza failed. not connected");
            return false;
        }
        self.ctx.send_stanza(stanza)
    }

    /// Processes everything the IO thread reported since the last call. `_delta_seconds` is the
    /// time since the previous tick.
    pub fn tick(&mut self, _delta_seconds: f32) {
        self.apply_status_updates();

        self.ping.tick();
        self.presence.tick();
        self.private_chat.tick(&self.presence);
        self.multi_user_chat.tick();
        self.pubsub.tick();
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn presence_mut(&mut self) -> &mut Presence {
        &mut self.presence
    }

    pub fn ping(&self) -> &Ping {
        &self.ping
    }

    pub fn ping_mut(&mut self) -> &mut Ping {
        &mut self.ping
    }

    pub fn private_chat(&self) -> &PrivateChat {
        &self.private_chat
    }

    pub fn private_chat_mut(&mut self) -> &mut PrivateChat {
        &mut self.private_chat
    }

    pub fn multi_user_chat(&self) -> &MultiUserChat {
        &self.multi_user_chat
    }

    pub fn multi_user_chat_mut(&mut self) -> &mut MultiUserChat {
        &mut self.multi_user_chat
    }

    pub fn pubsub(&self) -> &PubSub {
        &self.pubsub
    }

    pub fn pubsub_mut(&mut self) -> &mut PubSub {
        &mut self.pubsub
    }
}

impl ConnectionManager {
    fn start_io_thread(
        &mut self,
        config: &ServerConfig,
        jid: UserJid,
        password: String,
    ) -> Result<()> {
        let context = WireContext::new(&jid)?;
        let connection = WireConnection::new(
            context,
            (self.transport_provider)(),
            jid.clone(),
            SecretString::new(password),
            config.keep_alive(),
            self.ctx.id_provider(),
        );

        let (status_tx, status_rx) = mpsc::channel();
        let io_thread = IoThread::start(
            connection,
            config.server_address(),
            self.ctx.id_provider(),
            status_tx,
            self.dispatcher.clone().into_callback(),
        )?;

        self.ctx.set_jid(Some(jid));
        self.ctx.set_outbound(Some(io_thread.outbound_sender()));
        self.status_updates = Some(status_rx);
        self.io_thread = Some(io_thread);
        Ok(())
    }

    fn apply_status_updates(&mut self) {
        let Some(status_updates) = &self.status_updates else {
            return;
        };
        let updates = status_updates.try_iter().collect::<Vec<_>>();

        for update in updates {
            self.apply_status_update(update);
        }
    }

    fn apply_status_update(&mut self, update: LoginStatusUpdate) {
        let previous = self.ctx.login_status();
        let status = update.status;
        if previous == status {
            return;
        }

        info!("Login status changed from {} to {}.", previous, status);
        self.ctx.set_login_status(status);
        let user_jid = self.ctx.jid().unwrap_or_default();

        if status == LoginStatus::LoggedOut {
            self.ctx.set_outbound(None);
            self.ping.handle_disconnect();
            self.presence.handle_disconnect();
            self.private_chat.handle_disconnect();
            self.multi_user_chat.handle_disconnect();
            self.pubsub.handle_disconnect();
        }

        if let Some(error) = &update.error {
            warn!("Connection error: {}", error);
        }

        match previous {
            LoginStatus::ProcessingLogin => self.on_login_complete.broadcast(&LoginComplete {
                user_jid: user_jid.clone(),
                success: status == LoginStatus::LoggedIn,
                error: update.error.clone(),
            }),
            LoginStatus::ProcessingLogout => self.on_logout_complete.broadcast(&LogoutComplete {
                user_jid: user_jid.clone(),
                success: status == LoginStatus::LoggedOut,
                error: update.error.clone(),
            }),
            _ => (),
        }

        if matches!(status, LoginStatus::LoggedIn | LoginStatus::LoggedOut)
            && status != self.last_stable_status
        {
            self.last_stable_status = status;
            self.on_login_changed
                .broadcast(&LoginChanged { user_jid, status });
        }
    }
}
