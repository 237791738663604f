//! Diagnostic snapshot of a run's normalized records.
//!
//! Written between normalization and dispatch when enabled. A write failure
//! here is the one fatal path in a run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use chordsync_shared::{ChordsyncError, NormalizedRecord, Result};

/// Write all normalized records to `normalized_records_<source>.txt` in `dir`.
/// Returns the path written.
pub fn write_snapshot(
    dir: &Path,
    source: &str,
    records: &[NormalizedRecord],
    elapsed: Duration,
) -> Result<PathBuf> {
    let mut contents = format!(
        "{source} parser:\n\
         date: {}\n\
         parsing time: {}s {}ms\n\
         active records count: {}\n\
         {}\n",
        chrono::Utc::now().format("%a %b %d %Y"),
        elapsed.as_secs(),
        elapsed.subsec_millis(),
        records.len(),
        "-".repeat(50),
    );

    for (i, record) in records.iter().enumerate() {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| ChordsyncError::parse(format!("snapshot serialization failed: {e}")))?;
        contents.push_str(&format!("{}. {json}\n\n", i + 1));
    }

    let path = dir.join(format!("normalized_records_{source}.txt"));
    std::fs::write(&path, contents).map_err(|e| ChordsyncError::io(&path, e))?;

    info!(?path, count = records.len(), "normalized records snapshot written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chordsync_shared::NormalizedAlbum;

    fn record(title: &str) -> NormalizedRecord {
        NormalizedRecord {
            title: title.into(),
            body_text: "text".into(),
            url: format!("https://songs.example.com/{title}"),
            audio_url: None,
            video_url: None,
            tags: vec![],
            translations: vec![],
            chords_key: None,
            album: NormalizedAlbum::default(),
        }
    }

    #[test]
    fn snapshot_contains_header_and_numbered_records() {
        let dir = std::env::temp_dir().join(format!("chordsync-snap-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let records = vec![record("one"), record("two")];
        let path = write_snapshot(&dir, "holychords", &records, Duration::from_millis(1500))
            .expect("write");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("holychords parser:\n"));
        assert!(contents.contains("parsing time: 1s 500ms"));
        assert!(contents.contains("active records count: 2"));
        assert!(contents.contains("1. {"));
        assert!(contents.contains("2. {"));
        assert!(contents.contains("\"bodyText\""));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_failure_is_an_error() {
        let missing = Path::new("/definitely/not/a/real/directory");
        let result = write_snapshot(missing, "holychords", &[], Duration::ZERO);
        assert!(matches!(result, Err(ChordsyncError::Io { .. })));
    }
}
