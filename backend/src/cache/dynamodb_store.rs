use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;
use std::collections::HashMap;

use super::models::CacheEntry;
use super::store::{CacheError, CacheStore};

const KEY_ATTR: &str = "cache_key";
const PAYLOAD_ATTR: &str = "payload";
const EXPIRES_ATTR: &str = "expires_at";

/// Cache entries in a DynamoDB table keyed by `cache_key`. `expires_at` is
/// the table's TTL attribute; DynamoDB deletes lazily, so reads check it too.
#[derive(Clone)]
pub struct DynamoCacheStore {
    client: Client,
    table: String,
}

impl DynamoCacheStore {
    pub fn new(client: Client, table: String) -> Self {
        Self { client, table }
    }

    fn to_item(entry: &CacheEntry) -> Result<HashMap<String, AttributeValue>, CacheError> {
        let mut item = HashMap::new();
        item.insert(KEY_ATTR.to_string(), AttributeValue::S(entry.key.clone()));
        item.insert(
            "backend".to_string(),
            AttributeValue::S(entry.backend.clone()),
        );
        item.insert(
            PAYLOAD_ATTR.to_string(),
            AttributeValue::S(serde_json::to_string(entry)?),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(entry.created_at.to_rfc3339()),
        );
        item.insert(
            EXPIRES_ATTR.to_string(),
            AttributeValue::N(entry.expires_at().timestamp().to_string()),
        );
        Ok(item)
    }

    fn parse_item(item: &HashMap<String, AttributeValue>) -> Result<CacheEntry, CacheError> {
        let payload = item
            .get(PAYLOAD_ATTR)
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| CacheError::Store("Invalid payload".to_string()))?;
        Ok(serde_json::from_str(payload)?)
    }
}

#[async_trait]
impl CacheStore for DynamoCacheStore {
    fn name(&self) -> &'static str {
        "dynamodb"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(KEY_ATTR, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;

        let Some(item) = result.item else {
            return Ok(None);
        };

        let expires_at = item
            .get(EXPIRES_ATTR)
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok());
        if expires_at.is_some_and(|ts| ts <= Utc::now().timestamp()) {
            return Ok(None);
        }

        let entry = Self::parse_item(&item)?;
        if entry.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let item = Self::to_item(entry)?;

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;

        Ok(())
    }
}
