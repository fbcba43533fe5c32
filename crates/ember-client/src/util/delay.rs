// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use ember_xmpp::{ns, StanzaTree};

/// XEP-0203 `<delay/>` carrying `time` as its stamp.
pub(crate) fn delay_element(time: DateTime<Utc>) -> StanzaTree {
    StanzaTree::new_with_ns("delay", ns::DELAY)
        .set_attribute("stamp", time.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// The stamp of the stanza's `<delay/>` child, if it has a valid one.
pub(crate) fn delay_stamp(stanza: &StanzaTree) -> Option<DateTime<Utc>> {
    let delay = stanza.child("delay", ns::DELAY)?;
    let stamp = delay.attribute("stamp")?;

    match DateTime::parse_from_rfc3339(stamp) {
        Ok(time) => Some(time.with_timezone(&Utc)),
        Err(err) => {
            debug!("Ignoring invalid delay stamp '{}'. {}", stamp, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_reads_written_stamp() {
        let time = Utc.with_ymd_and_hms(2023, 4, 1, 10, 30, 0).unwrap();
        let stanza = StanzaTree::new("message").add_child(delay_element(time));

        assert_eq!(
            stanza
                .child("delay", ns::DELAY)
                .unwrap()
                .attribute("stamp"),
            Some("2023-04-01T10:30:00.000Z")
        );
        assert_eq!(delay_stamp(&stanza), Some(time));
    }

    #[test]
    fn test_ignores_invalid_stamp() {
        let stanza = StanzaTree::new("message").add_child(
            StanzaTree::new_with_ns("delay", ns::DELAY).set_attribute("stamp", "yesterday"),
        );
        assert_eq!(delay_stamp(&stanza), None);
        assert_eq!(delay_stamp(&StanzaTree::new("message")), None);
    }
}
