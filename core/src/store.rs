//! Component storage boundary
//!
//! [`ComponentStore`] is the interface saved components go through;
//! [`MemoryStore`] is the in-process implementation. No CLI subcommand
//! persists components; the store is library surface for embedders.

use chrono::Utc;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::types::ComponentRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Component not found")]
    NotFound,

    #[error("Valid component ID is required")]
    InvalidId,

    #[error("{0}")]
    InvalidCode(String),
}

#[allow(async_fn_in_trait)]
pub trait ComponentStore {
    async fn create(&self, code: &str) -> Result<ComponentRecord, StoreError>;

    async fn read(&self, id: &str) -> Result<ComponentRecord, StoreError>;

    async fn update(&self, id: &str, code: &str) -> Result<ComponentRecord, StoreError>;

    /// Returns the id of the removed record
    async fn delete(&self, id: &str) -> Result<Uuid, StoreError>;
}

/// Checks a component must pass before it is stored
pub fn validate_code(code: &str) -> Result<(), StoreError> {
    if code.trim().is_empty() {
        return Err(StoreError::InvalidCode(
            "Code is required and must be a non-empty string".to_string(),
        ));
    }
    if !["function", "const", "class"].iter().any(|k| code.contains(k)) {
        return Err(StoreError::InvalidCode(
            "Code must be a valid React component".to_string(),
        ));
    }
    if !code.contains("return") && !code.contains("render") {
        return Err(StoreError::InvalidCode(
            "Code must have a return statement or render method".to_string(),
        ));
    }
    Ok(())
}

fn parse_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id.trim()).map_err(|_| StoreError::InvalidId)
}

/* ===================== In-memory Store ===================== */

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<IndexMap<Uuid, ComponentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl ComponentStore for MemoryStore {
    async fn create(&self, code: &str) -> Result<ComponentRecord, StoreError> {
        validate_code(code)?;
        let now = Utc::now();
        let record = ComponentRecord {
            id: Uuid::new_v4(),
            code: code.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.records.write().await.insert(record.id, record.clone());
        debug!(id = %record.id, "component created");
        Ok(record)
    }

    async fn read(&self, id: &str) -> Result<ComponentRecord, StoreError> {
        let id = parse_id(id)?;
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, id: &str, code: &str) -> Result<ComponentRecord, StoreError> {
        let id = parse_id(id)?;
        if code.trim().is_empty() {
            return Err(StoreError::InvalidCode(
                "Code is required and must be a non-empty string".to_string(),
            ));
        }
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound)?;
        validate_code(code)?;
        record.code = code.trim().to_string();
        record.updated_at = Utc::now();
        debug!(%id, "component updated");
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<Uuid, StoreError> {
        let id = parse_id(id)?;
        self.records
            .write()
            .await
            .shift_remove(&id)
            .map(|record| record.id)
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    const CODE: &str = "  function App() { return <div/>; }\n";

    #[test]
    fn test_create_trims_and_assigns_v4_id() {
        let store = MemoryStore::new();
        let record = block_on(store.create(CODE)).unwrap();
        assert_eq!(record.code, "function App() { return <div/>; }");
        assert_eq!(record.id.get_version_num(), 4);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(block_on(store.read(&record.id.to_string())).unwrap(), record);
    }

    #[test]
    fn test_validation_messages() {
        let store = MemoryStore::new();
        let cases = [
            ("   ", "Code is required and must be a non-empty string"),
            ("let x = 1; return x;", "Code must be a valid React component"),
            ("const x = 1;", "Code must have a return statement or render method"),
        ];
        for (code, message) in cases {
            let err = block_on(store.create(code)).unwrap_err();
            assert_eq!(err, StoreError::InvalidCode(message.to_string()));
        }
        assert!(block_on(store.is_empty()));
    }

    #[test]
    fn test_update_refreshes_timestamp() {
        let store = MemoryStore::new();
        let record = block_on(store.create(CODE)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let updated = block_on(store.update(
            &record.id.to_string(),
            "const App = () => { return null; };",
        ))
        .unwrap();
        assert_eq!(updated.id, record.id);
        assert_eq!(updated.created_at, record.created_at);
        assert!(updated.updated_at > record.updated_at);
        assert_eq!(updated.code, "const App = () => { return null; };");
    }

    #[test]
    fn test_ids_and_missing_records() {
        let store = MemoryStore::new();
        assert_eq!(block_on(store.read("not-a-uuid")), Err(StoreError::InvalidId));
        let missing = Uuid::new_v4().to_string();
        assert_eq!(block_on(store.read(&missing)), Err(StoreError::NotFound));
        assert_eq!(block_on(store.update(&missing, CODE)), Err(StoreError::NotFound));
        assert_eq!(block_on(store.delete(&missing)), Err(StoreError::NotFound));
    }

    #[test]
    fn test_delete_removes_record() {
        let store = MemoryStore::new();
        let record = block_on(store.create(CODE)).unwrap();
        let id = record.id.to_string();
        assert_eq!(block_on(store.delete(&id)), Ok(record.id));
        assert_eq!(block_on(store.read(&id)), Err(StoreError::NotFound));
        assert_eq!(block_on(store.len()), 0);
    }
}
