use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{Query, RemoteStore};
use crate::error::{Error, Result};

/// in-process stand-in for the hosted datastore
///
/// selected with `store.url = "memory://"`, and used by the test suites.
/// assigns `id` and `created_at` like the real tables do.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failure: Mutex<Option<(u16, String)>>,
    next_id: AtomicU64,
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// make every following call fail with this upstream status
    pub fn fail_with(&self, status: u16, body: &str) {
        *lock(&self.failure) = Some((status, body.to_string()));
    }

    pub fn recover(&self) {
        *lock(&self.failure) = None;
    }

    /// number of `query` calls seen so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }

    fn check_failure(&self) -> Result<()> {
        match lock(&self.failure).as_ref() {
            Some((status, body)) => Err(Error::Upstream { status: *status, body: body.clone() }),
            None => Ok(()),
        }
    }
}

// a poisoned lock only means a test panicked mid-call; the data is still usable
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn matches(row: &Value, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(column, expected)| match row.get(column) {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == *expected,
        Some(Value::Bool(b)) => b.to_string() == *expected,
        _ => false,
    })
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => CmpOrdering::Greater,
        (None, Some(_)) => CmpOrdering::Less,
        _ => CmpOrdering::Equal,
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn insert(&self, table: &str, mut record: Value) -> Result<Value> {
        self.check_failure()?;
        let Some(obj) = record.as_object_mut() else {
            return Err(Error::Upstream { status: 400, body: "expected a json object".into() });
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        obj.insert("id".into(), Value::from(id));
        obj.insert("created_at".into(), Value::from(Utc::now().to_rfc3339()));

        lock(&self.tables).entry(table.to_string()).or_default().push(record.clone());
        Ok(record)
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let tables = lock(&self.tables);
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, &query.filters)).cloned().collect())
            .unwrap_or_default();
        drop(tables);

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(&order.column), b.get(&order.column));
                if order.descending { ord.reverse() } else { ord }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn patch(&self, table: &str, filters: &[(String, String)], fields: Value) -> Result<Vec<Value>> {
        self.check_failure()?;
        let Some(updates) = fields.as_object() else {
            return Err(Error::Upstream { status: 400, body: "expected a json object".into() });
        };

        let mut tables = lock(&self.tables);
        let mut updated = Vec::new();
        for row in tables.get_mut(table).into_iter().flatten() {
            if !matches(row, filters) {
                continue;
            }
            if let Some(obj) = row.as_object_mut() {
                for (k, v) in updates {
                    obj.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }
}
