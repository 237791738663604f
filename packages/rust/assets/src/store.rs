//! Object-store boundary: the [`ObjectStore`] trait, the S3 implementation,
//! and canonical URL construction.
//!
//! Keys are opaque strings; the dedup engine uses the content digest as the
//! key, so identical bytes always land on the same object.

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use tracing::{debug, info};
use url::Url;

use chordsync_shared::config::StoreConfig;
use chordsync_shared::{ChordsyncError, Result};

/// Storage backend for deduplicated assets.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether an object already exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Upload `bytes` under `key`. Returns the stored key.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String>;

    /// Public base address objects are served from.
    fn public_base_url(&self) -> &Url;
}

/// Build the stable public URL for a stored object.
///
/// Pure function of the store's base address and the key, so the same key
/// always reproduces the same URL.
pub fn canonical_url(base: &Url, key: &str) -> String {
    base.join(key)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{base}{key}"))
}

// ---------------------------------------------------------------------------
// S3 implementation
// ---------------------------------------------------------------------------

/// S3-compatible object store (DigitalOcean Spaces, MinIO, AWS).
pub struct S3Store {
    client: Client,
    bucket: String,
    public_base: Url,
}

impl S3Store {
    /// Build a store client from config plus resolved credentials.
    pub fn new(config: &StoreConfig, access_key: &str, secret_key: &str) -> Result<Self> {
        let credentials = Credentials::new(access_key, secret_key, None, None, "chordsync-store");

        let s3_config = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .endpoint_url(format!("https://{}", config.endpoint))
            .build();

        // Virtual-host style: https://{bucket}.{endpoint}/{key}
        let public_base = Url::parse(&format!("https://{}.{}/", config.bucket, config.endpoint))
            .map_err(|e| {
                ChordsyncError::config(format!("invalid store endpoint {}: {e}", config.endpoint))
            })?;

        info!(bucket = %config.bucket, endpoint = %config.endpoint, "object store client initialized");

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base,
        })
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_not_found() => Ok(false),
            Err(e) => Err(ChordsyncError::Store(format!(
                "existence check for {key} failed: {e}"
            ))),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        debug!(key, size = bytes.len(), "uploading object");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ChordsyncError::Store(format!("upload of {key} failed: {e}")))?;

        Ok(key.to_string())
    }

    fn public_base_url(&self) -> &Url {
        &self.public_base
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-memory store used in tests and offline development.
///
/// Counts `exists`/`put` calls so tests can assert dedup behavior.
pub struct MemoryStore {
    objects: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    exists_calls: std::sync::atomic::AtomicUsize,
    put_calls: std::sync::atomic::AtomicUsize,
    public_base: Url,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: std::sync::Mutex::new(std::collections::HashMap::new()),
            exists_calls: std::sync::atomic::AtomicUsize::new(0),
            put_calls: std::sync::atomic::AtomicUsize::new(0),
            public_base: Url::parse("https://assets.test.invalid/").expect("static URL"),
        }
    }

    /// Seed an object, bypassing the counters.
    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .expect("store lock")
            .insert(key.to_string(), bytes);
    }

    pub fn exists_count(&self) -> usize {
        self.exists_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.put_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().expect("store lock").len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.exists_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.objects.lock().expect("store lock").contains_key(key))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        self.put_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.objects
            .lock()
            .expect("store lock")
            .insert(key.to_string(), bytes);
        Ok(key.to_string())
    }

    fn public_base_url(&self) -> &Url {
        &self.public_base
    }
}
