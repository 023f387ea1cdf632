use std::collections::HashMap;
use std::sync::RwLock;

use super::r#trait::{TokenFilter, TokenRecord, TokenStore, TokenStoreError};

/// In-memory token store keyed by token string.
///
/// Intended for tests/dev. Every mutation happens under one write lock, which
/// is what makes `find_one_and_delete` atomic.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    records: RwLock<HashMap<String, TokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record matching `filter` (test/diagnostic helper).
    pub fn snapshot(&self, filter: &TokenFilter) -> Result<Vec<TokenRecord>, TokenStoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.values().filter(|r| filter.matches(r)).cloned().collect())
    }

    /// Flip the blacklist flag on a record, returning whether it existed.
    pub fn set_blacklisted(&self, token: &str, blacklisted: bool) -> Result<bool, TokenStoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        Ok(records
            .get_mut(token)
            .map(|r| r.blacklisted = blacklisted)
            .is_some())
    }

    fn first_match<'a>(
        records: &'a HashMap<String, TokenRecord>,
        filter: &TokenFilter,
    ) -> Option<&'a TokenRecord> {
        match filter.token.as_deref() {
            Some(token) => records.get(token).filter(|r| filter.matches(r)),
            None => records.values().find(|r| filter.matches(r)),
        }
    }
}

fn poisoned() -> TokenStoreError {
    TokenStoreError::Storage("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn create(&self, record: TokenRecord) -> Result<(), TokenStoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.contains_key(&record.token) {
            return Err(TokenStoreError::Duplicate);
        }
        records.insert(record.token.clone(), record);
        Ok(())
    }

    async fn find_one(&self, filter: &TokenFilter) -> Result<Option<TokenRecord>, TokenStoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(Self::first_match(&records, filter).cloned())
    }

    async fn find_one_and_delete(
        &self,
        filter: &TokenFilter,
    ) -> Result<Option<TokenRecord>, TokenStoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let Some(key) = Self::first_match(&records, filter).map(|r| r.token.clone()) else {
            return Ok(None);
        };
        Ok(records.remove(&key))
    }

    async fn delete_many(&self, filter: &TokenFilter) -> Result<u64, TokenStoreError> {
        if filter.is_unscoped() {
            return Err(TokenStoreError::UnscopedDelete);
        }
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let before = records.len();
        records.retain(|_, r| !filter.matches(r));
        Ok((before - records.len()) as u64)
    }
}
