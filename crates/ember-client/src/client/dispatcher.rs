// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use tracing::debug;

use ember_xmpp::{StanzaCallback, StanzaTree};

use crate::mods::StanzaHandler;

/// Offers inbound stanzas to each handler in order until one claims it.
pub(crate) struct StanzaDispatcher {
    handlers: Vec<Arc<dyn StanzaHandler>>,
}

impl StanzaDispatcher {
    pub fn new(handlers: Vec<Arc<dyn StanzaHandler>>) -> Self {
        StanzaDispatcher { handlers }
    }

    /// Returns the name of the handler that claimed `stanza`.
    pub fn dispatch(&self, stanza: &StanzaTree) -> Option<&'static str> {
        let claimed_by = self
            .handlers
            .iter()
            .find(|handler| handler.handle_stanza(stanza))
            .map(|handler| handler.name());

        if claimed_by.is_none() {
            debug!("Unhandled stanza: {}", stanza);
        }
        claimed_by
    }

    pub fn into_callback(self: Arc<Self>) -> StanzaCallback {
        Arc::new(move |stanza| {
            self.dispatch(&stanza);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    use ember_xmpp::stanza;

    use super::*;

    struct NamedHandler {
        name: &'static str,
        claims: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl StanzaHandler for NamedHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle_stanza(&self, stanza: &StanzaTree) -> bool {
            self.seen.lock().push(self.name);
            stanza.name() == self.claims
        }
    }

    #[test]
    fn test_first_claim_wins() {
        let seen = Arc::new(Mutex::new(vec![]));
        let handler = |name, claims| -> Arc<dyn StanzaHandler> {
            Arc::new(NamedHandler {
                name,
                claims,
                seen: seen.clone(),
            })
        };

        let dispatcher = StanzaDispatcher::new(vec![
            handler("a", "iq"),
            handler("b", "message"),
            handler("c", "message"),
        ]);

        assert_eq!(
            dispatcher.dispatch(&stanza!(r#"<message xmlns="jabber:client"/>"#)),
            Some("b")
        );
        assert_eq!(*seen.lock(), vec!["a", "b"]);

        seen.lock().clear();
        assert_eq!(
            dispatcher.dispatch(&stanza!(r#"<presence xmlns="jabber:client"/>"#)),
            None
        );
        assert_eq!(*seen.lock(), vec!["a", "b", "c"]);
    }
}
