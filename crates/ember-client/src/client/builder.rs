// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use ember_xmpp::{
    IDProvider, SystemTimeProvider, TimeProvider, TransportProvider, UUIDProvider,
    XmppRsTransport,
};

use crate::client::ConnectionManager;
use crate::ServerConfig;

pub struct ConnectionManagerBuilder {
    config: ServerConfig,
    transport_provider: Option<TransportProvider>,
    id_provider: Arc<dyn IDProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ConnectionManagerBuilder {
    pub(crate) fn new() -> Self {
        ConnectionManagerBuilder {
            config: ServerConfig::default(),
            transport_provider: None,
            id_provider: Arc::new(UUIDProvider::new()),
            time_provider: Arc::new(SystemTimeProvider::default()),
        }
    }

    pub fn set_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_transport_provider(mut self, transport_provider: TransportProvider) -> Self {
        self.transport_provider = Some(transport_provider);
        self
    }

    pub fn set_id_provider<P: IDProvider + 'static>(mut self, id_provider: P) -> Self {
        self.id_provider = Arc::new(id_provider);
        self
    }

    pub fn set_time_provider<T: TimeProvider + 'static>(mut self, time_provider: T) -> Self {
        self.time_provider = Arc::new(time_provider);
        self
    }

    pub fn build(self) -> ConnectionManager {
        ConnectionManager::from_parts(
            self.config,
            self.transport_provider
                .unwrap_or_else(XmppRsTransport::provider),
            self.id_provider,
            self.time_provider,
        )
    }
}
