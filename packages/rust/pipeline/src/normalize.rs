//! Normalization stage: [`DetailedRecord`] → [`NormalizedRecord`].
//!
//! Every asset-bearing URL goes through the dedup engine; the record shape
//! is otherwise carried over unchanged.

use chordsync_assets::AssetDeduper;
use chordsync_shared::{AssetReference, DetailedRecord, NormalizedAlbum, NormalizedRecord};

/// Maps detailed records into the wire shape, rehosting their assets.
pub struct Normalizer {
    deduper: AssetDeduper,
}

impl Normalizer {
    pub fn new(deduper: AssetDeduper) -> Self {
        Self { deduper }
    }

    /// Normalize one record. Asset fields that could not be retrieved or
    /// hashed come back as `None`; non-hostable assets keep their original
    /// URL.
    pub async fn normalize(&self, record: DetailedRecord) -> NormalizedRecord {
        let DetailedRecord {
            title,
            body_text,
            url,
            audio_url,
            video_url,
            tags,
            translations,
            chords_key,
            album,
        } = record;

        let audio_url = self.rehost(audio_url).await;
        let video_url = self.rehost(video_url).await;
        let album_thumbnail = self.rehost(album.thumbnail_url).await;

        let author = match album.author {
            Some(mut author) => {
                author.thumbnail_url = self.rehost(author.thumbnail_url).await;
                Some(author)
            }
            None => None,
        };

        NormalizedRecord {
            title,
            body_text,
            url,
            audio_url,
            video_url,
            tags,
            translations,
            chords_key,
            album: NormalizedAlbum {
                title: album.title,
                thumbnail_url: album_thumbnail,
                author,
                year: None,
                text: None,
            },
        }
    }

    async fn rehost(&self, url: Option<String>) -> Option<String> {
        self.deduper.rehost(&AssetReference::from_url(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chordsync_assets::MemoryStore;
    use chordsync_shared::{AlbumRecord, Author};
    use chordsync_sources::SourceClient;
    use sha2::{Digest, Sha256};

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn normalizer(store: Arc<MemoryStore>) -> Normalizer {
        let client = Arc::new(SourceClient::new(Duration::from_secs(5)).unwrap());
        Normalizer::new(AssetDeduper::new(client, store))
    }

    #[tokio::test]
    async fn record_without_assets_never_touches_the_store() {
        let store = Arc::new(MemoryStore::new());
        let normalizer = normalizer(Arc::clone(&store));

        let record = DetailedRecord {
            title: "No Assets".into(),
            body_text: "words".into(),
            url: "https://songs.example.com/no-assets".into(),
            chords_key: Some("key_A".into()),
            ..Default::default()
        };

        let normalized = normalizer.normalize(record).await;

        assert_eq!(normalized.title, "No Assets");
        assert_eq!(normalized.audio_url, None);
        assert_eq!(normalized.album.year, None);
        assert_eq!(store.exists_count(), 0);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn asset_fields_are_rehosted_through_the_dedup_engine() {
        let mut cover = PNG_MAGIC.to_vec();
        cover.extend_from_slice(&[0u8; 32]);
        let digest = {
            let mut hasher = Sha256::new();
            hasher.update(&cover);
            format!("{:x}", hasher.finalize())
        };

        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/cover.png"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(cover))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let normalizer = normalizer(Arc::clone(&store));

        let record = DetailedRecord {
            title: "With Cover".into(),
            url: "https://songs.example.com/with-cover".into(),
            album: AlbumRecord {
                title: Some("Album".into()),
                thumbnail_url: Some(format!("{}/cover.png", server.uri())),
                author: Some(Author {
                    name: "Someone".into(),
                    url: None,
                    description: None,
                    thumbnail_url: None,
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let normalized = normalizer.normalize(record).await;

        assert_eq!(
            normalized.album.thumbnail_url.as_deref(),
            Some(format!("https://assets.test.invalid/{digest}").as_str())
        );
        assert_eq!(store.put_count(), 1);
        // Album url from the detailed shape is dropped on the wire.
        assert_eq!(normalized.album.author.as_ref().unwrap().name, "Someone");
    }
}
