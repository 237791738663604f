//! Core domain types for the chordsync record pipeline.
//!
//! A record moves through three shapes: [`Identifier`] (acquisition),
//! [`DetailedRecord`] (extraction), [`NormalizedRecord`] (the wire shape the
//! sink accepts). Each shape is consumed exactly once by the next stage.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

/// A source-site author, attached to identifiers during acquisition.
///
/// `description` is acquisition-side metadata and never reaches the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub name: String,
    pub url: Option<String>,
    #[serde(default, skip_serializing)]
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Identifier
// ---------------------------------------------------------------------------

/// A reference to one source record, produced by the acquisition stage and
/// consumed once by the detail stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// Opaque locator for the record (a site-relative path).
    pub uri: String,
    /// Pre-fetched author association, if the listing supplied one.
    pub author: Option<Author>,
}

// ---------------------------------------------------------------------------
// DetailedRecord
// ---------------------------------------------------------------------------

/// A translation link extracted from a record page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub label: String,
    pub url: Option<String>,
}

/// Album block as extracted from a record page. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumRecord {
    pub title: Option<String>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub author: Option<Author>,
}

/// The raw extracted record. Optional fields may be unpopulated; the record
/// is never retained past normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailedRecord {
    pub title: String,
    pub body_text: String,
    pub url: String,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub tags: Vec<String>,
    pub translations: Vec<Translation>,
    pub chords_key: Option<String>,
    pub album: AlbumRecord,
}

// ---------------------------------------------------------------------------
// NormalizedRecord (wire shape)
// ---------------------------------------------------------------------------

/// Album block on the wire: asset URLs replaced by their canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAlbum {
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub author: Option<Author>,
    pub year: Option<String>,
    pub text: Option<String>,
}

/// The unit handed to dispatch: a [`DetailedRecord`] with every asset-bearing
/// URL replaced by its canonical deduplicated form. Immutable once produced;
/// serializes to exactly the field set the sink accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub title: String,
    pub body_text: String,
    pub url: String,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub tags: Vec<String>,
    pub translations: Vec<Translation>,
    pub chords_key: Option<String>,
    pub album: NormalizedAlbum,
}

// ---------------------------------------------------------------------------
// AssetReference
// ---------------------------------------------------------------------------

/// Input to the dedup engine: an external URL plus an optional logical name
/// hint. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct AssetReference {
    pub url: Option<String>,
    /// Human-readable hint surfaced in logs; dedup identity is digest-only.
    pub name_hint: Option<String>,
}

impl AssetReference {
    /// Build a reference from an optional URL, deriving the name hint from
    /// the URL's final path segment.
    pub fn from_url(url: Option<String>) -> Self {
        let name_hint = url
            .as_deref()
            .and_then(|u| u.rsplit('/').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self { url, name_hint }
    }
}
