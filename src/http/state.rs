use crate::config::Config;
use crate::interceptor::StatsdInterceptor;
use crate::metrics::SharedTelemetry;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub interceptor: Arc<StatsdInterceptor>,
    pub telemetry: SharedTelemetry,
    pub users: Arc<RwLock<BTreeMap<u64, User>>>,
    next_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        interceptor: Arc<StatsdInterceptor>,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self {
            config,
            interceptor,
            telemetry,
            users: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn create_user(&self, name: String) -> User {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let user = User { id, name };
        self.users.write().insert(id, user.clone());
        user
    }

    pub fn get_user(&self, id: u64) -> Option<User> {
        self.users.read().get(&id).cloned()
    }
}
