use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetUpload {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredAsset {
    pub key: String,
    /// Externally resolvable location, the value kept in a profile's asset slot.
    pub location: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetStoreError {
    #[error("failed to write object: {0}")]
    Write(String),
    #[error("failed to delete object {key}: {reason}")]
    Delete { key: String, reason: String },
}

#[async_trait::async_trait]
pub trait AssetStore {
    /// Stores the payload under a freshly generated key.
    async fn put(&self, upload: AssetUpload) -> Result<StoredAsset, AssetStoreError>;
    /// Deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), AssetStoreError>;
    /// Maps a location previously returned by `put` back to its key. Locations this
    /// store did not hand out yield `None`.
    fn key_for_location(&self, location: &str) -> Option<String>;
}

/// 32 random bytes, hex encoded. Not derived from the owner or the content.
pub fn generate_object_key() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

#[derive(Clone)]
pub struct MockAssetStore {
    base_url: String,
    objects: Arc<Mutex<HashMap<String, AssetUpload>>>,
    fail_put: Arc<AtomicBool>,
    fail_delete: Arc<AtomicBool>,
}

impl Default for MockAssetStore {
    fn default() -> Self {
        Self::new("https://assets.test/")
    }
}

#[allow(unused)]
impl MockAssetStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            objects: Arc::new(Mutex::new(HashMap::new())),
            fail_put: Arc::new(AtomicBool::new(false)),
            fail_delete: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn get_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get_object(&self, key: &str) -> Option<AssetUpload> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn location_for(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }

    pub fn set_fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl AssetStore for MockAssetStore {
    async fn put(&self, upload: AssetUpload) -> Result<StoredAsset, AssetStoreError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(AssetStoreError::Write("mock put failure".to_string()));
        }
        let key = generate_object_key();
        self.objects.lock().unwrap().insert(key.clone(), upload);
        Ok(StoredAsset {
            location: self.location_for(&key),
            key,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), AssetStoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AssetStoreError::Delete {
                key: key.to_string(),
                reason: "mock delete failure".to_string(),
            });
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn key_for_location(&self, location: &str) -> Option<String> {
        location
            .strip_prefix(&self.base_url)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}
