//! Persisted watermark of the last successful sync.
//!
//! The state file is a single JSON object:
//!
//! ```json
//! { "last_sync_timestamp": "2024-06-01T00:00:00.000Z" }
//! ```
//!
//! Epoch-second numbers are accepted on read as well. Anything unreadable is
//! treated as the epoch origin so the next run simply re-syncs everything.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Boundary below which all source changes are considered synchronized.
/// Always whole seconds, matching the precision of the source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    pub const EPOCH: Watermark = Watermark(DateTime::<Utc>::UNIX_EPOCH);

    pub fn from_epoch_seconds(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Watermark)
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        // Drop sub-second precision; the source compares whole seconds.
        Watermark::from_epoch_seconds(dt.timestamp()).unwrap_or(Watermark::EPOCH)
    }

    /// One second earlier, so that a change at `self` is still picked up by the
    /// next `updated_at > watermark` query. Saturates at the epoch origin.
    pub fn just_before(&self) -> Watermark {
        Watermark::from_epoch_seconds(self.epoch_seconds() - 1)
            .filter(|w| *w >= Watermark::EPOCH)
            .unwrap_or(Watermark::EPOCH)
    }

    pub fn epoch_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn to_iso(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Watermark::EPOCH
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

#[derive(Deserialize)]
struct RawState {
    last_sync_timestamp: Option<RawTimestamp>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Iso(String),
    Epoch(i64),
}

#[derive(Serialize)]
struct StoredState {
    last_sync_timestamp: String,
}

/// File-backed watermark storage.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the watermark. Never fails: a missing or corrupt file yields [`Watermark::EPOCH`].
    pub fn load(&self) -> Watermark {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file, starting fresh");
                return Watermark::EPOCH;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file unreadable, starting fresh");
                return Watermark::EPOCH;
            }
        };

        match parse_state(&content) {
            Ok(wm) => {
                tracing::info!(watermark = %wm, "loaded sync state");
                wm
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file invalid, starting fresh");
                Watermark::EPOCH
            }
        }
    }

    /// Overwrite the state file through a temp file in the same directory and a rename,
    /// so an interrupted write never leaves a truncated file behind.
    pub fn save(&self, watermark: Watermark) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .wrap_err_with(|| format!("Failed to create state directory: {}", dir.display()))?;

        let state = StoredState {
            last_sync_timestamp: watermark.to_iso(),
        };
        let json = serde_json::to_string_pretty(&state).wrap_err("Failed to encode sync state")?;

        let mut tmp = NamedTempFile::new_in(&dir).wrap_err("Failed to create temporary state file")?;
        tmp.write_all(json.as_bytes())
            .wrap_err("Failed to write temporary state file")?;
        tmp.as_file()
            .sync_all()
            .wrap_err("Failed to flush temporary state file")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .wrap_err_with(|| format!("Failed to replace state file: {}", self.path.display()))?;

        tracing::info!(watermark = %watermark, "saved sync state");
        Ok(())
    }
}

fn parse_state(content: &str) -> Result<Watermark> {
    let raw: RawState = serde_json::from_str(content).wrap_err("not a JSON state object")?;
    match raw.last_sync_timestamp {
        None => Err(eyre!("missing 'last_sync_timestamp'")),
        Some(RawTimestamp::Epoch(secs)) => Watermark::from_epoch_seconds(secs)
            .ok_or_else(|| eyre!("epoch value out of range: {}", secs)),
        Some(RawTimestamp::Iso(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Watermark::from_datetime(dt.with_timezone(&Utc)))
            .wrap_err_with(|| format!("invalid timestamp: {:?}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("sync_state.json"))
    }

    #[test]
    fn just_before_steps_back_one_second() {
        let w = Watermark::from_epoch_seconds(1_717_200_000).unwrap();
        assert_eq!(w.just_before().epoch_seconds(), 1_717_199_999);
        assert_eq!(Watermark::EPOCH.just_before(), Watermark::EPOCH);
    }

    #[test]
    fn missing_file_is_epoch() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(&dir).load(), Watermark::EPOCH);
    }

    #[test]
    fn corrupt_contents_are_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for bad in [
            "",
            "not json",
            "{}",
            r#"{"last_sync_timestamp": null}"#,
            r#"{"last_sync_timestamp": true}"#,
            r#"{"last_sync_timestamp": "yesterday"}"#,
        ] {
            fs::write(store.path(), bad).unwrap();
            assert_eq!(store.load(), Watermark::EPOCH, "input: {bad:?}");
        }
    }

    #[test]
    fn accepts_iso_and_epoch_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let expected = Watermark::from_epoch_seconds(1_717_200_000).unwrap();

        fs::write(store.path(), r#"{"last_sync_timestamp": "2024-06-01T00:00:00.000Z"}"#).unwrap();
        assert_eq!(store.load(), expected);

        fs::write(store.path(), r#"{"last_sync_timestamp": "2024-06-01T02:00:00+02:00"}"#).unwrap();
        assert_eq!(store.load(), expected);

        fs::write(store.path(), r#"{"last_sync_timestamp": 1717200000}"#).unwrap();
        assert_eq!(store.load(), expected);
    }

    #[test]
    fn save_writes_iso_millis_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let wm = Watermark::from_epoch_seconds(1_717_200_000).unwrap();

        store.save(wm).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["last_sync_timestamp"], "2024-06-01T00:00:00.000Z");
        assert_eq!(store.load(), wm);
    }

    #[test]
    fn save_creates_missing_parent_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/deeper/state.json"));

        store.save(Watermark::from_epoch_seconds(10).unwrap()).unwrap();
        store.save(Watermark::from_epoch_seconds(20).unwrap()).unwrap();

        assert_eq!(store.load().epoch_seconds(), 20);
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested/deeper"))
            .unwrap()
            .flatten()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn from_datetime_drops_subseconds() {
        let dt = DateTime::parse_from_rfc3339("2024-06-01T00:00:00.750Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Watermark::from_datetime(dt).to_iso(), "2024-06-01T00:00:00.000Z");
    }
}
