use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::results::CombinedResults;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CacheEnvelope {
    format_version: u32,
    created_at: DateTime<Utc>,
    results: CombinedResults,
}

/// On-disk copy of the last experiment run, so reports can be regenerated
/// without retraining.
#[derive(Debug, Clone)]
pub struct ResultCache {
    path: PathBuf,
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `Ok(None)` when there is nothing cached yet. A cache file that
    /// exists but cannot be decoded is an error.
    pub fn load(&self) -> Result<Option<CombinedResults>> {
        let start_time = Instant::now();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(action = "miss", component = "result_cache", path = ?self.path, "No cached results");
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to open cached results {:?}", self.path))
            }
        };

        let envelope: CacheEnvelope = serde_json::from_reader(BufReader::new(file))
            .with_context(|| {
                format!(
                    "Cached results {:?} are corrupt; delete the file or rerun with --force",
                    self.path
                )
            })?;
        if envelope.format_version != FORMAT_VERSION {
            bail!(
                "Cached results {:?} use format version {}, expected {}; delete the file or rerun with --force",
                self.path,
                envelope.format_version,
                FORMAT_VERSION
            );
        }
        envelope
            .results
            .validate()
            .with_context(|| format!("Cached results {:?} are inconsistent", self.path))?;

        info!(
            action = "hit",
            component = "result_cache",
            path = ?self.path,
            created_at = %envelope.created_at,
            duration_ms = start_time.elapsed().as_millis(),
            "Loaded cached results"
        );
        Ok(Some(envelope.results))
    }

    /// Replaces the cache file. The data is written to a sibling temporary
    /// file first and renamed over the target, so a crash leaves either the
    /// old or the new cache behind.
    pub fn store(&self, results: &CombinedResults) -> Result<()> {
        let start_time = Instant::now();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
        }

        let envelope = CacheEnvelope {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            results: results.clone(),
        };

        let tmp_path = self.tmp_path();
        let written = write_envelope(&tmp_path, &envelope);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace cached results {:?}", self.path))?;

        info!(
            action = "store",
            component = "result_cache",
            path = ?self.path,
            duration_ms = start_time.elapsed().as_millis(),
            "Stored results"
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "results".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_envelope(path: &Path, envelope: &CacheEnvelope) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, envelope)
        .with_context(|| format!("Failed to serialize results to {:?}", path))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {:?}", path))?;
    writer
        .get_ref()
        .sync_all()
        .with_context(|| format!("Failed to sync {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{FoldResult, Label, ModelOutcome, TestRecord};

    fn sample() -> CombinedResults {
        CombinedResults {
            bigram: ModelOutcome::Present(vec![FoldResult {
                records: vec![
                    TestRecord(Label::Name("benign".into()), "example.com".into()),
                    TestRecord(Label::Index(1), "qwzkdj.net".into()),
                ],
                y: vec![0, 1],
                probs: vec![0.125, 0.875],
            }]),
            lstm: ModelOutcome::Skipped,
        }
    }

    #[test]
    fn missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join("results.pkl"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn round_trip_keeps_skipped_models() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join("nested").join("results.pkl"));
        let results = sample();
        cache.store(&results).unwrap();
        assert_eq!(cache.load().unwrap(), Some(results));
        assert!(!dir.path().join("nested").join("results.pkl.tmp").exists());
    }

    #[test]
    fn store_overwrites_previous_results() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join("results.pkl"));
        cache.store(&sample()).unwrap();

        let mut newer = sample();
        newer.lstm = newer.bigram.clone();
        newer.bigram = ModelOutcome::Skipped;
        cache.store(&newer).unwrap();
        assert_eq!(cache.load().unwrap(), Some(newer));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.pkl");
        fs::write(&path, b"\x80\x03}q\x00").unwrap();
        let err = ResultCache::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("--force"));
    }

    #[test]
    fn unknown_format_version_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.pkl");
        fs::write(
            &path,
            r#"{"format_version": 99, "created_at": "2024-01-01T00:00:00Z",
                "results": {"bigram": {"status": "skipped"}, "lstm": {"status": "skipped"}}}"#,
        )
        .unwrap();
        assert!(ResultCache::new(&path).load().is_err());
    }
}
