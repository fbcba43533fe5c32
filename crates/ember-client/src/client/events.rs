// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use ember_xmpp::{ConnectionError, LoginStatus, UserJid};

/// Fired once per login attempt, when it leaves `ProcessingLogin`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginComplete {
    pub user_jid: UserJid,
    pub success: bool,
    pub error: Option<ConnectionError>,
}

/// Fired on every edge between `LoggedIn` and `LoggedOut`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginChanged {
    pub user_jid: UserJid,
    pub status: LoginStatus,
}

/// Fired once per logout attempt, when it leaves `ProcessingLogout`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoutComplete {
    pub user_jid: UserJid,
    pub success: bool,
    pub error: Option<ConnectionError>,
}
