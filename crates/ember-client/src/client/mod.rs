// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use builder::ConnectionManagerBuilder;
pub use connection_manager::ConnectionManager;
pub use events::{LoginChanged, LoginComplete, LogoutComplete};
pub use module_context::ModuleContext;

mod builder;
mod connection_manager;
mod dispatcher;
mod events;
mod module_context;
