//! Shared state passed to all API handlers

use std::sync::Arc;

use crate::query::Query;
use crate::store::NodeRegistry;
use crate::transport::LocalBus;

#[derive(Clone)]
pub struct ApiState {
    /// Read-side accessors over the collector's store
    pub query: Query,

    /// In-process bus the admin publish endpoint writes to
    pub bus: Arc<LocalBus>,
}

impl ApiState {
    pub fn new(query: Query, bus: Arc<LocalBus>) -> Self {
        Self { query, bus }
    }

    pub fn registry(&self) -> &NodeRegistry {
        self.query.store().nodes()
    }
}
