//! Server state

use std::sync::Arc;

use crate::commands::router::CommandRouter;
use crate::storage::commands::CommandStore;

/// Server state shared across handlers
pub struct ServerState {
    pub store: Arc<dyn CommandStore>,
    pub router: Arc<CommandRouter>,
}

impl ServerState {
    pub fn new(store: Arc<dyn CommandStore>, router: Arc<CommandRouter>) -> Self {
        Self { store, router }
    }
}
