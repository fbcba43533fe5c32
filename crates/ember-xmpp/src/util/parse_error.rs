// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use crate::JidParseError;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error: {msg}")]
    Generic { msg: String },
    #[error(transparent)]
    Jid(#[from] JidParseError),
}

impl From<minidom::Error> for ParseError {
    fn from(value: minidom::Error) -> Self {
        ParseError::Generic {
            msg: value.to_string(),
        }
    }
}
