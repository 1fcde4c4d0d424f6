// Datastore Module
// Payment documents live as jsonb rows, one table per collection.
use crate::models::{Order, ProviderSettings, SecurityLogEntry};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ORDERS: &str = "orders";
pub const SECURITY_LOGS: &str = "payment_security_logs";
pub const PROVIDER_SETTINGS: &str = "shopier_settings";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to read documents: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait Datastore: Send + Sync {
    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, StoreError>;

    async fn find_security_log(
        &self,
        order_id: &str,
    ) -> Result<Option<SecurityLogEntry>, StoreError>;

    async fn find_active_settings(&self) -> Result<Option<ProviderSettings>, StoreError>;
}

// ==================== POSTGRES ====================
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        // Three point lookups, one after another
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        tracing::info!("🔗 Connected to datastore");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Datastore for PgDocumentStore {
    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let doc = sqlx::query_scalar::<_, Json<Order>>(
            "SELECT doc FROM orders WHERE doc->>'id' = $1 LIMIT 1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(doc.map(|Json(order)| order))
    }

    async fn find_security_log(
        &self,
        order_id: &str,
    ) -> Result<Option<SecurityLogEntry>, StoreError> {
        let doc = sqlx::query_scalar::<_, Json<SecurityLogEntry>>(
            "SELECT doc FROM payment_security_logs WHERE doc->>'orderId' = $1 LIMIT 1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(doc.map(|Json(log)| log))
    }

    async fn find_active_settings(&self) -> Result<Option<ProviderSettings>, StoreError> {
        let doc = sqlx::query_scalar::<_, Json<ProviderSettings>>(
            "SELECT doc FROM shopier_settings WHERE doc->'isActive' = 'true'::jsonb LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(doc.map(|Json(settings)| settings))
    }
}

// ==================== IN-MEMORY ====================
/// Documents keyed by collection name. Loaded from a JSON export
/// (`{"orders": [...], "payment_security_logs": [...], ...}`) when the
/// database itself is not reachable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Value>>,
}

impl MemoryStore {
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        let collections: HashMap<String, Vec<Value>> = serde_json::from_str(&raw)?;

        let total: usize = collections.values().map(Vec::len).sum();
        tracing::info!("📂 Loaded {} documents from {}", total, path.display());
        Ok(Self { collections })
    }

    fn find_one<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        expected: &Value,
    ) -> Result<Option<T>, StoreError> {
        let found = self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.get(field) == Some(expected)));

        match found {
            Some(doc) => Ok(Some(serde_json::from_value(doc.clone())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: &str, doc: Value) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        self.find_one(ORDERS, "id", &Value::from(order_id))
    }

    async fn find_security_log(
        &self,
        order_id: &str,
    ) -> Result<Option<SecurityLogEntry>, StoreError> {
        self.find_one(SECURITY_LOGS, "orderId", &Value::from(order_id))
    }

    async fn find_active_settings(&self) -> Result<Option<ProviderSettings>, StoreError> {
        self.find_one(PROVIDER_SETTINGS, "isActive", &Value::Bool(true))
    }
}
