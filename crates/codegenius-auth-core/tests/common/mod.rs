//! Shared fixtures for integration tests

use std::time::Duration;

use async_trait::async_trait;
use codegenius_auth_core::{AuthError, CredentialVerifier};
use codegenius_store::{KvStore, StoreError, StoreResult};
use codegenius_types::UserId;
use dashmap::DashMap;

pub const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

/// In-memory credential backend
#[derive(Default)]
pub struct MockCredentialVerifier {
    users: DashMap<String, (String, UserId)>,
}

impl MockCredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, username: &str, password: &str) -> UserId {
        let user_id = UserId::new();
        self.users
            .insert(username.to_string(), (password.to_string(), user_id));
        user_id
    }
}

#[async_trait]
impl CredentialVerifier for MockCredentialVerifier {
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserId>, AuthError> {
        Ok(self
            .users
            .get(username)
            .filter(|entry| entry.0 == password)
            .map(|entry| entry.1))
    }
}

/// A store whose every call fails, for outage behavior tests
pub struct FailingStore;

#[async_trait]
impl KvStore for FailingStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Err(StoreError::Unavailable("store down".to_string()))
    }

    async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
        Err(StoreError::Unavailable("store down".to_string()))
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("store down".to_string()))
    }

    async fn incr_with_ttl(&self, _key: &str, _ttl: Duration) -> StoreResult<u64> {
        Err(StoreError::Unavailable("store down".to_string()))
    }

    async fn incr_refresh_ttl(&self, _key: &str, _ttl: Duration) -> StoreResult<u64> {
        Err(StoreError::Unavailable("store down".to_string()))
    }

    async fn scan_prefix(&self, _prefix: &str) -> StoreResult<Vec<(String, String)>> {
        Err(StoreError::Unavailable("store down".to_string()))
    }
}
