use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

use super::{Query, RemoteStore};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// postgrest client for the hosted datastore
///
/// authenticates with the static service key on every request; the key is
/// sent both as `apikey` and as a bearer token, which is what the hosted
/// gateway expects.
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %body, "store rejected request");
            return Err(Error::Upstream { status: status.as_u16(), body });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// postgrest answers writes with an array even for a single row
fn into_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn insert(&self, table: &str, record: Value) -> Result<Value> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&record);
        let rows = into_rows(self.send(request).await?);
        // fall back to what we sent if the store returned no representation
        Ok(rows.into_iter().next().unwrap_or(record))
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let request = self.client.get(self.table_url(table)).query(&query.to_params());
        Ok(into_rows(self.send(request).await?))
    }

    async fn patch(&self, table: &str, filters: &[(String, String)], fields: Value) -> Result<Vec<Value>> {
        let params: Vec<(String, String)> = filters
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{}", value)))
            .collect();
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&params)
            .header("Prefer", "return=representation")
            .json(&fields);
        Ok(into_rows(self.send(request).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_url_strips_trailing_slash() {
        let config = StoreConfig { url: "https://db.example.com/".into(), ..Default::default() };
        let store = RestStore::new(&config).unwrap();
        assert_eq!(store.table_url("sessions"), "https://db.example.com/rest/v1/sessions");
    }

    #[test]
    fn single_object_becomes_one_row() {
        assert_eq!(into_rows(json!({"id": 1})).len(), 1);
        assert_eq!(into_rows(json!([{"id": 1}, {"id": 2}])).len(), 2);
        assert!(into_rows(Value::Null).is_empty());
    }
}
