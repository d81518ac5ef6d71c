//! ==============================================================================
//! store - remote datastore client
//! ==============================================================================
//!
//! purpose:
//!     every read and write the gateway makes goes through `RemoteStore`.
//!     the real implementation (`RestStore`) speaks the postgrest dialect the
//!     hosted datastore exposes; `MemoryStore` keeps rows in process for
//!     offline development and tests.
//!
//!     each call is exactly one round trip. nothing is retried and nothing is
//!     cached here.
//!
//! relationships:
//!     - used by: api/handlers.rs (write path), relay.rs (latest row),
//!       summary and export handlers (bulk reads)
//!     - uses: error.rs (non-2xx answers become `Error::Upstream`)
//!
//! ==============================================================================

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::domain::{Reading, Session};
use crate::error::{Error, Result};

/// column ordering for a query
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// equality filters, ordering and a row limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, String)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(Order { column: column.to_string(), descending: true });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// query-string pairs in postgrest syntax
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{}", value)))
            .collect();
        if let Some(order) = &self.order {
            let dir = if order.descending { "desc" } else { "asc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, dir)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// insert one row, returning the stored representation
    async fn insert(&self, table: &str, record: Value) -> Result<Value>;

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Value>>;

    /// update matching rows, returning them after the update
    async fn patch(&self, table: &str, filters: &[(String, String)], fields: Value)
        -> Result<Vec<Value>>;
}

/// typed access to the two tables the gateway knows about
#[derive(Clone)]
pub struct SensorStore {
    remote: Arc<dyn RemoteStore>,
    readings_table: String,
    sessions_table: String,
}

impl SensorStore {
    pub fn new(remote: Arc<dyn RemoteStore>, config: &StoreConfig) -> Self {
        Self {
            remote,
            readings_table: config.readings_table.clone(),
            sessions_table: config.sessions_table.clone(),
        }
    }

    pub async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        let record = serde_json::to_value(reading)?;
        self.remote.insert(&self.readings_table, record).await?;
        Ok(())
    }

    /// most recent readings first
    pub async fn recent_readings(&self, session_id: Option<&str>, limit: usize) -> Result<Vec<Reading>> {
        let mut query = Query::new().order_desc("device_ts").limit(limit);
        if let Some(id) = session_id {
            query = query.eq("session_id", id);
        }
        let rows = self.remote.query(&self.readings_table, &query).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(Error::from))
            .collect()
    }

    pub async fn latest_reading(&self, session_id: Option<&str>) -> Result<Option<Reading>> {
        Ok(self.recent_readings(session_id, 1).await?.into_iter().next())
    }

    pub async fn start_session(&self, device_id: &str) -> Result<Session> {
        let record = json!({
            "device_id": device_id,
            "started_at": Utc::now().to_rfc3339(),
        });
        let row = self.remote.insert(&self.sessions_table, record).await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn stop_session(&self, session_id: &str) -> Result<Session> {
        let filters = [("id".to_string(), session_id.to_string())];
        let fields = json!({ "stopped_at": Utc::now().to_rfc3339() });
        let rows = self.remote.patch(&self.sessions_table, &filters, fields).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;
        Ok(serde_json::from_value(row)?)
    }
}
