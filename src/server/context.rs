use super::ServerStats;
use crate::dispatch::RequestHandler;
use crate::store::StorePool;
use std::fmt;
use std::sync::Arc;

/// Everything the reactor and the workers share, passed in explicitly at
/// startup.
#[derive(Clone)]
pub struct ServerContext {
    pub handler: Arc<dyn RequestHandler>,
    pub stores: Arc<StorePool>,
    pub stats: Arc<ServerStats>,
}

impl ServerContext {
    pub fn new(handler: Arc<dyn RequestHandler>, stores: StorePool) -> Self {
        Self {
            handler,
            stores: Arc::new(stores),
            stats: Arc::new(ServerStats::new()),
        }
    }
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerContext")
            .field("stores", &self.stores)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
