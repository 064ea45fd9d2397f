//! Append-only release history ("memory store") and actor metrics.
//!
//! One JSON file per record under a per-repository slug directory. Same
//! atomic-write and size-cap discipline as the run store.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use relicta_core::ids::repo_slug;

use crate::error::StoreError;
use crate::file_store::MAX_DOC_BYTES;

/// How a released run ultimately fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Shipped and stayed.
    Success,
    /// Failed before or after publication.
    Failed,
    /// Shipped, then reverted.
    RolledBack,
}

/// One historical release outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// Record identity.
    pub id: String,
    /// Repository the release belonged to.
    pub repository: String,
    /// Released version string.
    pub version: String,
    /// When the release went out.
    pub released_at: DateTime<Utc>,
    /// Risk score at decision time.
    pub risk_score: f64,
    /// Decision kind that let it through.
    pub decision: String,
    /// Final outcome.
    pub outcome: ReleaseOutcome,
    /// Kind-prefixed actor id that drove the release.
    pub actor: String,
    /// Files changed.
    #[serde(default)]
    pub files_changed: u64,
    /// Lines changed.
    #[serde(default)]
    pub lines_changed: u64,
    /// Breaking changes shipped.
    #[serde(default)]
    pub breaking_changes: u32,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ReleaseRecord {
    /// New record with a fresh identity.
    #[must_use]
    pub fn new(
        repository: impl Into<String>,
        version: impl Into<String>,
        actor: impl Into<String>,
        decision: impl Into<String>,
        outcome: ReleaseOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            repository: repository.into(),
            version: version.into(),
            released_at: Utc::now(),
            risk_score: 0.0,
            decision: decision.into(),
            outcome,
            actor: actor.into(),
            files_changed: 0,
            lines_changed: 0,
            breaking_changes: 0,
            metadata: BTreeMap::new(),
        }
    }
}

/// Per-actor release counts derived from the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActorMetrics {
    /// Everything the actor released.
    pub total_releases: u64,
    /// Releases that stuck.
    pub successful_releases: u64,
    /// Releases that failed or were rolled back.
    pub failed_releases: u64,
}

/// Append-only file-backed release history.
#[derive(Debug)]
pub struct MemoryStore {
    base: PathBuf,
    lock: RwLock<()>,
    max_doc_bytes: u64,
}

impl MemoryStore {
    /// Open (creating if needed) the history under `base`.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<Self, StoreError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&base, fs::Permissions::from_mode(0o700))?;
        }
        Ok(Self { base, lock: RwLock::new(()), max_doc_bytes: MAX_DOC_BYTES })
    }

    /// Append one record. Records are never rewritten.
    pub fn append(&self, record: &ReleaseRecord) -> Result<(), StoreError> {
        let _guard = self.lock.write().expect("memory lock poisoned");
        let dir = self.base.join(repo_slug(&record.repository));
        fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }

        let body = serde_json::to_vec_pretty(record)?;
        let tmp = dir.join(format!(".{}.tmp", record.id));
        {
            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&tmp)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(tmp, dir.join(format!("{}.json", record.id)))?;
        Ok(())
    }

    /// Release history for one repository, newest first, capped at `limit`
    /// (0 means unlimited).
    pub fn history(&self, repository: &str, limit: usize) -> Result<Vec<ReleaseRecord>, StoreError> {
        let _guard = self.lock.read().expect("memory lock poisoned");
        let dir = self.base.join(repo_slug(repository));
        let mut records = self.read_dir_records(&dir)?;
        records.sort_by(|a, b| b.released_at.cmp(&a.released_at));
        if limit > 0 {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// Counts across all repositories for one actor id.
    pub fn actor_metrics(&self, actor_id: &str) -> Result<ActorMetrics, StoreError> {
        let _guard = self.lock.read().expect("memory lock poisoned");
        let mut metrics = ActorMetrics::default();
        for entry in fs::read_dir(&self.base)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            for record in self.read_dir_records(&entry.path())? {
                if record.actor != actor_id {
                    continue;
                }
                metrics.total_releases += 1;
                match record.outcome {
                    ReleaseOutcome::Success => metrics.successful_releases += 1,
                    ReleaseOutcome::Failed | ReleaseOutcome::RolledBack => {
                        metrics.failed_releases += 1;
                    }
                }
            }
        }
        Ok(metrics)
    }

    fn read_dir_records(&self, dir: &Path) -> Result<Vec<ReleaseRecord>, StoreError> {
        let mut records = Vec::new();
        if !dir.is_dir() {
            return Ok(records);
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match self.read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable release record");
                }
            }
        }
        Ok(records)
    }

    fn read_record(&self, path: &Path) -> Result<ReleaseRecord, StoreError> {
        let size = fs::metadata(path)?.len();
        if size > self.max_doc_bytes {
            return Err(StoreError::TooLarge { size, max: self.max_doc_bytes });
        }
        let file = File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
