//! Content-addressed asset deduplication.
//!
//! [`AssetDeduper::rehost`] resolves a remote asset reference to the URL of a
//! canonical, deduplicated, durably hosted copy. An asset can also be left
//! untouched (pass-through) or dropped (not retrievable).

use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tracing::{debug, warn};

use chordsync_shared::{AssetReference, Result};
use chordsync_sources::SourceClient;

use crate::hash::hash_stream;
use crate::sniff;
use crate::store::{ObjectStore, canonical_url};

/// Resolves asset references against the object store, uploading each unique
/// content at most once.
pub struct AssetDeduper {
    client: Arc<SourceClient>,
    store: Arc<dyn ObjectStore>,
}

impl AssetDeduper {
    pub fn new(client: Arc<SourceClient>, store: Arc<dyn ObjectStore>) -> Self {
        Self { client, store }
    }

    /// Resolve `asset` to its canonical hosted URL.
    ///
    /// Returns:
    /// - `None` — no URL, fetch failed, or the hash was aborted; the field
    ///   is dropped.
    /// - the original URL — content type undetermined or not hostable, or
    ///   the upload path failed after hashing.
    /// - the canonical store URL — content hashed and present (or uploaded).
    ///
    /// The existence check and upload are not atomic; two concurrent calls
    /// for the same new content may both upload, which wastes one write on an
    /// identical-content key.
    pub async fn rehost(&self, asset: &AssetReference) -> Option<String> {
        let url = asset.url.as_deref().filter(|u| !u.is_empty())?;
        if url.starts_with('/') {
            // Site-relative leftovers cannot be fetched.
            return None;
        }

        debug!(%url, name = asset.name_hint.as_deref().unwrap_or("-"), "resolving asset");

        let response = match self.client.get_stream(url).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "asset fetch failed");
                return None;
            }
        };
        let declared_len = response.content_length();
        let mut body = Box::pin(response.bytes_stream());

        // Leading bytes decide the content type.
        let head = match body.next().await {
            Some(Ok(head)) => head,
            Some(Err(e)) => {
                warn!(%url, error = %e, "asset stream failed before sniffing");
                return None;
            }
            None => {
                debug!(%url, "empty asset body, passing through");
                return Some(url.to_string());
            }
        };

        let Some(kind) = sniff::sniff_kind(&head) else {
            debug!(%url, "content type undetermined, passing through");
            return Some(url.to_string());
        };
        if !sniff::is_hostable(kind) {
            debug!(%url, kind, "content type not hostable, passing through");
            return Some(url.to_string());
        }

        let remainder = stream::iter([Ok(head)]).chain(body);
        let digest = match hash_stream(remainder, declared_len).await {
            Some(digest) => digest,
            None => {
                warn!(%url, "asset hash aborted");
                return None;
            }
        };

        // Dedup identity is the digest alone.
        let key = digest;

        match self.store.exists(&key).await {
            Ok(true) => {
                debug!(%url, key, "dedup hit, skipping upload");
                return Some(canonical_url(self.store.public_base_url(), &key));
            }
            Ok(false) => {}
            Err(e) => {
                warn!(%url, error = %e, "existence check failed, assuming missing");
            }
        }

        // The hashing pass consumed the stream; re-acquire for upload.
        let bytes = match self.fetch_all(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%url, error = %e, "re-fetch for upload failed, keeping original URL");
                return Some(url.to_string());
            }
        };

        match self.store.put(&key, bytes).await {
            Ok(stored_key) => Some(canonical_url(self.store.public_base_url(), &stored_key)),
            Err(e) => {
                warn!(%url, error = %e, "upload failed, keeping original URL");
                Some(url.to_string())
            }
        }
    }

    /// Buffer a full asset body for upload.
    async fn fetch_all(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get_stream(url).await?;
        let bytes = response.bytes().await.map_err(|e| {
            chordsync_shared::ChordsyncError::Network(format!("{url}: body read failed: {e}"))
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sha2::{Digest, Sha256};

    use crate::store::MemoryStore;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn png_bytes() -> Vec<u8> {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        bytes
    }

    fn hex_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    async fn serve(path: &str, body: Vec<u8>) -> wiremock::MockServer {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(path))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;
        server
    }

    fn deduper(store: Arc<MemoryStore>) -> AssetDeduper {
        let client = Arc::new(SourceClient::new(Duration::from_secs(5)).unwrap());
        AssetDeduper::new(client, store)
    }

    fn asset(url: String) -> AssetReference {
        AssetReference::from_url(Some(url))
    }

    #[tokio::test]
    async fn rehost_uploads_once_and_is_idempotent() {
        let content = png_bytes();
        let digest = hex_sha256(&content);
        let server = serve("/cover.png", content).await;

        let store = Arc::new(MemoryStore::new());
        let deduper = deduper(Arc::clone(&store));
        let reference = asset(format!("{}/cover.png", server.uri()));

        let first = deduper.rehost(&reference).await.expect("first call");
        let second = deduper.rehost(&reference).await.expect("second call");

        assert_eq!(first, second);
        assert_eq!(first, format!("https://assets.test.invalid/{digest}"));
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn rehost_skips_upload_when_content_already_stored() {
        let content = png_bytes();
        let digest = hex_sha256(&content);
        let server = serve("/cover.png", content.clone()).await;

        let store = Arc::new(MemoryStore::new());
        store.insert(&digest, content);
        let deduper = deduper(Arc::clone(&store));

        let url = deduper
            .rehost(&asset(format!("{}/cover.png", server.uri())))
            .await
            .expect("canonical URL");

        assert_eq!(url, format!("https://assets.test.invalid/{digest}"));
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn undetermined_content_passes_through_without_store_interaction() {
        let server = serve("/notes.txt", b"plain text, no magic bytes".to_vec()).await;

        let store = Arc::new(MemoryStore::new());
        let deduper = deduper(Arc::clone(&store));
        let original = format!("{}/notes.txt", server.uri());

        let url = deduper.rehost(&asset(original.clone())).await.expect("URL");

        assert_eq!(url, original);
        assert_eq!(store.exists_count(), 0);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn non_hostable_kind_passes_through() {
        // A zip is sniffable but not on the allow-list.
        let mut zip = b"PK\x03\x04".to_vec();
        zip.extend_from_slice(&[0u8; 32]);
        let server = serve("/bundle.zip", zip).await;

        let store = Arc::new(MemoryStore::new());
        let deduper = deduper(Arc::clone(&store));
        let original = format!("{}/bundle.zip", server.uri());

        let url = deduper.rehost(&asset(original.clone())).await.expect("URL");

        assert_eq!(url, original);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_drops_the_asset() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let deduper = deduper(store);

        let result = deduper
            .rehost(&asset(format!("{}/gone.png", server.uri())))
            .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn missing_or_relative_urls_are_noops() {
        let store = Arc::new(MemoryStore::new());
        let deduper = deduper(Arc::clone(&store));

        assert_eq!(deduper.rehost(&AssetReference::default()).await, None);
        assert_eq!(
            deduper
                .rehost(&asset("/media/relative.png".to_string()))
                .await,
            None
        );
        assert_eq!(store.exists_count(), 0);
    }
}
