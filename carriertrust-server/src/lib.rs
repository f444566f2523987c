pub mod company;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod http_client;
pub mod identity;
pub mod lifecycle;
pub mod moderation;
pub mod notifier;
pub mod session;
pub mod store;

use std::sync::Arc;

use directory::PublicDirectory;
use identity::IdentityProvider;
use lifecycle::ReviewLifecycle;
use moderation::ModerationConsole;
use notifier::Notifier;
use store::RecordStore;

pub use carriertrust_core::get_version;
pub use error::AppError;
pub use session::Session;

/// Shared handles for every request.
///
/// `store` is the unrestricted backend; handlers only reach it through the
/// services, which wrap it in a per-caller `PolicyStore`.
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub notifier: Arc<dyn Notifier>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            store,
            notifier,
            identity,
        }
    }

    pub fn lifecycle(&self) -> ReviewLifecycle {
        ReviewLifecycle::new(self.store.clone(), self.notifier.clone())
    }

    pub fn moderation(&self) -> ModerationConsole {
        ModerationConsole::new(self.store.clone())
    }

    pub fn directory(&self) -> PublicDirectory {
        PublicDirectory::new(self.store.clone())
    }
}
