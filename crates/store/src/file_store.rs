//! Atomic JSON file store for release runs.
//!
//! Layout: one `<run_id>.json` per run under the base directory, mode 0600
//! in a 0700 directory. Writes go to a temp sibling, fsync, then rename.
//! Reads cap the document size to bound parse cost; scans skip malformed
//! or unreadable files with a logged warning instead of failing the query.
//!
//! Locking: a single read-write lock over the base directory. Reads share,
//! writes serialise, and a scan holds the read lock for its whole run.
//! Scans over more than `2 × workers` files fan out to a bounded worker
//! pool; smaller stores stay sequential to avoid thread churn.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};

use relicta_core::{CancelToken, DomainError};
use release::{decode, encode, ReleaseRun, RunDto, RunState};

use crate::error::StoreError;
use crate::spec::Specification;

/// Default cap on one run document.
pub const MAX_DOC_BYTES: u64 = 2 * 1024 * 1024;
/// Default scan worker count.
pub const DEFAULT_SCAN_WORKERS: usize = 4;

/// File-backed run repository.
#[derive(Debug)]
pub struct FileStore {
    base: PathBuf,
    lock: RwLock<()>,
    max_doc_bytes: u64,
    workers: usize,
}

impl FileStore {
    /// Open (creating if needed) a store at `base`.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<Self, StoreError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&base, fs::Permissions::from_mode(0o700))?;
        }
        Ok(Self {
            base,
            lock: RwLock::new(()),
            max_doc_bytes: MAX_DOC_BYTES,
            workers: DEFAULT_SCAN_WORKERS,
        })
    }

    /// Override the document size cap.
    #[must_use]
    pub const fn with_max_doc_bytes(mut self, max: u64) -> Self {
        self.max_doc_bytes = max;
        self
    }

    /// Override the scan worker count (minimum 1).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// The store's base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.base.join(format!("{id}.json"))
    }

    /// Persist one run atomically. Saving the same run twice produces
    /// identical bytes (the document embeds no save-time state beyond
    /// `updated_at`, which the aggregate owns).
    pub fn save(&self, run: &ReleaseRun) -> Result<(), StoreError> {
        let _guard = self.lock.write().expect("store lock poisoned");
        let dto = encode(run);
        let body = serde_json::to_vec_pretty(&dto)?;
        let final_path = self.path_for(&run.id);
        let tmp_path = self.base.join(format!(".{}.tmp", run.id));

        {
            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut tmp = options.open(&tmp_path)?;
            tmp.write_all(&body)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        debug!(run = %run.id, path = %final_path.display(), bytes = body.len(), "run saved");
        Ok(())
    }

    /// Remove a run document. Deleting a missing run is a no-op.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.lock.write().expect("store lock poisoned");
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load one run by id.
    pub fn find_by_id(&self, id: &str) -> Result<ReleaseRun, StoreError> {
        let _guard = self.lock.read().expect("store lock poisoned");
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(DomainError::NotFound(format!("release run {id}")).into());
        }
        self.read_run_strict(&path)
    }

    /// The most recently created run for a repository.
    pub fn find_latest(
        &self,
        repo_id: &str,
        cancel: &CancelToken,
    ) -> Result<Option<ReleaseRun>, StoreError> {
        let mut runs = self.scan(cancel)?;
        runs.retain(|r| r.plan.repo_id == repo_id);
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(runs.pop())
    }

    /// Every run currently in `state`.
    pub fn find_by_state(
        &self,
        state: RunState,
        cancel: &CancelToken,
    ) -> Result<Vec<ReleaseRun>, StoreError> {
        let mut runs = self.scan(cancel)?;
        runs.retain(|r| r.state == state);
        Ok(runs)
    }

    /// Every run that has not reached a terminal state.
    pub fn find_active(&self, cancel: &CancelToken) -> Result<Vec<ReleaseRun>, StoreError> {
        let mut runs = self.scan(cancel)?;
        runs.retain(|r| !r.state.is_terminal());
        Ok(runs)
    }

    /// Every run satisfying a composable specification.
    pub fn find_by_specification(
        &self,
        specification: &dyn Specification,
        cancel: &CancelToken,
    ) -> Result<Vec<ReleaseRun>, StoreError> {
        let mut runs = self.scan(cancel)?;
        runs.retain(|r| specification.is_satisfied_by(r));
        Ok(runs)
    }

    /// Read every run document, skipping malformed or oversized files.
    /// Results are sorted by id for deterministic output.
    fn scan(&self, cancel: &CancelToken) -> Result<Vec<ReleaseRun>, StoreError> {
        cancel.check().map_err(StoreError::from)?;
        let _guard = self.lock.read().expect("store lock poisoned");

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&self.base)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut runs = if paths.len() > 2 * self.workers {
            self.scan_parallel(&paths, cancel)
        } else {
            self.scan_sequential(&paths, cancel)
        }?;
        runs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(runs)
    }

    fn scan_sequential(
        &self,
        paths: &[PathBuf],
        cancel: &CancelToken,
    ) -> Result<Vec<ReleaseRun>, StoreError> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            cancel.check().map_err(StoreError::from)?;
            if let Some(run) = self.read_run_lenient(path) {
                out.push(run);
            }
        }
        Ok(out)
    }

    fn scan_parallel(
        &self,
        paths: &[PathBuf],
        cancel: &CancelToken,
    ) -> Result<Vec<ReleaseRun>, StoreError> {
        let (path_tx, path_rx) = crossbeam_channel::unbounded::<PathBuf>();
        for path in paths {
            let _ = path_tx.send(path.clone());
        }
        drop(path_tx);

        let (out_tx, out_rx) = crossbeam_channel::unbounded::<ReleaseRun>();
        std::thread::scope(|scope| {
            for _ in 0..self.workers {
                let path_rx = path_rx.clone();
                let out_tx = out_tx.clone();
                let cancel = cancel.clone();
                scope.spawn(move || {
                    while let Ok(path) = path_rx.recv() {
                        if cancel.is_canceled() {
                            break;
                        }
                        if let Some(run) = self.read_run_lenient(&path) {
                            let _ = out_tx.send(run);
                        }
                    }
                });
            }
            drop(out_tx);
        });

        cancel.check().map_err(StoreError::from)?;
        Ok(out_rx.iter().collect())
    }

    fn read_run_strict(&self, path: &Path) -> Result<ReleaseRun, StoreError> {
        let size = fs::metadata(path)?.len();
        if size > self.max_doc_bytes {
            return Err(StoreError::TooLarge { size, max: self.max_doc_bytes });
        }
        let file = File::open(path)?;
        let dto: RunDto = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(decode(dto)?)
    }

    fn read_run_lenient(&self, path: &Path) -> Option<ReleaseRun> {
        match self.read_run_strict(path) {
            Ok(run) => Some(run),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable run document");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relicta_core::{Actor, BumpKind, TrustLevel, Version};
    use release::{ReleaseNotes, ReleasePlan};
    use tempfile::tempdir;

    fn run_for(repo: &str, commit: &str) -> ReleaseRun {
        let plan = ReleasePlan {
            repo_id: repo.into(),
            repo_root: format!("/work/{repo}"),
            base_ref: "v1.0.0".into(),
            head_sha: "abcdef1234567890".into(),
            commits: vec![commit.into()],
            config_hash: "cfg".into(),
            plugin_plan_hash: "plug".into(),
            changeset_id: None,
            changeset_body: None,
        };
        ReleaseRun::new(plan).unwrap()
    }

    fn advanced_run(repo: &str, commit: &str) -> ReleaseRun {
        let actor = Actor::human("alice", "Alice", TrustLevel::Full);
        let mut run = run_for(repo, commit);
        run.plan_release(&actor).unwrap();
        run.bump_version(Version::new(1, 1, 0), BumpKind::Minor, &actor).unwrap();
        run.attach_notes(ReleaseNotes::from_template("notes", "template"), &actor).unwrap();
        let _ = run.take_events();
        run
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let run = advanced_run("acme", "c1");
        store.save(&run).unwrap();
        let loaded = store.find_by_id(&run.id).unwrap();
        assert_eq!(loaded, run);
    }

    #[test]
    fn save_is_idempotent_on_disk() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let run = run_for("acme", "c1");
        store.save(&run).unwrap();
        let first = fs::read(store.base().join(format!("{}.json", run.id))).unwrap();
        store.save(&run).unwrap();
        let second = fs::read(store.base().join(format!("{}.json", run.id))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_run_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let err = store.find_by_id("run-0000000000000000").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let run = run_for("acme", "c1");
        store.save(&run).unwrap();
        store.delete(&run.id).unwrap();
        store.delete(&run.id).unwrap();
        assert!(store.find_by_id(&run.id).is_err());
    }

    #[test]
    fn malformed_documents_are_skipped_in_scans() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save(&run_for("acme", "c1")).unwrap();
        fs::write(dir.path().join("garbage.json"), b"{ not json").unwrap();

        let cancel = CancelToken::new();
        let active = store.find_active(&cancel).unwrap();
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn oversized_documents_are_rejected() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap().with_max_doc_bytes(64);
        let run = run_for("acme", "c1");
        store.save(&run).unwrap();
        let err = store.find_by_id(&run.id).unwrap_err();
        assert_eq!(err.kind(), "document_too_large");
    }

    #[test]
    fn queries_filter_and_sort() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let cancel = CancelToken::new();
        let a = run_for("acme", "c1");
        let b = advanced_run("acme", "c2");
        let c = run_for("other", "c3");
        for run in [&a, &b, &c] {
            store.save(run).unwrap();
        }

        let drafts = store.find_by_state(RunState::Draft, &cancel).unwrap();
        assert_eq!(drafts.len(), 2);
        let latest = store.find_latest("acme", &cancel).unwrap().unwrap();
        assert!(latest.id == a.id || latest.id == b.id);
        assert_eq!(store.find_active(&cancel).unwrap().len(), 3);
    }

    #[test]
    fn parallel_scan_matches_sequential() {
        let dir = tempdir().unwrap();
        // workers=1 with 12 files forces the parallel path (12 > 2).
        let store = FileStore::open(dir.path()).unwrap().with_workers(1);
        let cancel = CancelToken::new();
        for i in 0..12 {
            store.save(&run_for("acme", &format!("c{i}"))).unwrap();
        }
        let via_parallel = store.find_active(&cancel).unwrap();
        assert_eq!(via_parallel.len(), 12);
        // Deterministic order regardless of worker interleaving.
        let ids: Vec<&str> = via_parallel.iter().map(|r| r.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn canceled_scans_abort() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save(&run_for("acme", "c1")).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = store.find_active(&cancel).unwrap_err();
        assert_eq!(err.kind(), "canceled");
    }
}
