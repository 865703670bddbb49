//! Accesskey Repository

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::accesskey::entity::Accesskey;
use crate::shared::error::{CustomerError, Result};

#[async_trait]
pub trait AccesskeyRepository: Send + Sync {
    async fn create(&self, accesskey: &Accesskey) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Accesskey>>;

    /// Live accesskeys of a customer, oldest first.
    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Accesskey>>;
}

#[derive(Default)]
pub struct InMemoryAccesskeyRepository {
    keys: Mutex<HashMap<Uuid, Accesskey>>,
}

impl InMemoryAccesskeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

#[async_trait]
impl AccesskeyRepository for InMemoryAccesskeyRepository {
    async fn create(&self, accesskey: &Accesskey) -> Result<()> {
        let mut keys = self.keys.lock();
        if keys.contains_key(&accesskey.id) {
            return Err(CustomerError::conflict("accesskey already exists"));
        }
        keys.insert(accesskey.id, accesskey.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Accesskey>> {
        Ok(self.keys.lock().get(&id).cloned())
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Accesskey>> {
        let mut keys: Vec<Accesskey> = self
            .keys
            .lock()
            .values()
            .filter(|k| k.customer_id == customer_id && k.tm_delete.is_none())
            .cloned()
            .collect();
        keys.sort_by_key(|k| k.tm_create);
        Ok(keys)
    }
}
