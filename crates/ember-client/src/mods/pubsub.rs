// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use tracing::warn;

use ember_xmpp::StanzaTree;

use crate::mods::{Module, StanzaHandler};

/// Publish-subscribe placeholder. Every operation is refused.
pub struct PubSub {
    handler: Arc<PubSubHandler>,
}

struct PubSubHandler;

impl PubSub {
    pub(crate) fn new() -> Self {
        PubSub {
            handler: Arc::new(PubSubHandler),
        }
    }

    pub fn create_node(&self, node_id: &str) -> bool {
        unsupported("CreateNode", node_id)
    }

    pub fn configure_node(&self, node_id: &str) -> bool {
        unsupported("ConfigureNode", node_id)
    }

    pub fn destroy_node(&self, node_id: &str) -> bool {
        unsupported("DestroyNode", node_id)
    }

    pub fn query_subscriptions(&self) -> bool {
        unsupported("QuerySubscriptions", "")
    }

    pub fn subscribe(&self, node_id: &str) -> bool {
        unsupported("Subscribe", node_id)
    }

    pub fn unsubscribe(&self, node_id: &str) -> bool {
        unsupported("Unsubscribe", node_id)
    }

    pub fn publish_to_node(&self, node_id: &str, _message: &str) -> bool {
        unsupported("PublishToNode", node_id)
    }

    pub fn owned_node_ids(&self) -> Vec<String> {
        vec![]
    }

    pub fn subscribed_node_ids(&self) -> Vec<String> {
        vec![]
    }

    pub(crate) fn tick(&mut self) {}
}

fn unsupported(operation: &str, node_id: &str) -> bool {
    warn!("{} '{}' failed. PubSub is not supported.", operation, node_id);
    false
}

impl Module for PubSub {
    fn stanza_handler(&self) -> Arc<dyn StanzaHandler> {
        self.handler.clone()
    }
}

impl StanzaHandler for PubSubHandler {
    fn name(&self) -> &'static str {
        "pubsub"
    }

    fn handle_stanza(&self, _stanza: &StanzaTree) -> bool {
        false
    }
}
