use std::sync::Arc;

use server_api::ApiContext;
use shared::pagination::Paginator;
use storage::Storage;

use crate::auth::SessionKeys;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) storage: Storage,
    pub(crate) sessions: Arc<SessionKeys>,
}

impl AppState {
    pub(crate) fn new(storage: Storage, paginator: Paginator, sessions: SessionKeys) -> Self {
        Self {
            api: ApiContext::new(Arc::new(storage.clone()), paginator),
            storage,
            sessions: Arc::new(sessions),
        }
    }
}
