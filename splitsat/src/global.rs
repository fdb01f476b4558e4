//! The persistent fingerprint store.
//!
//! An append-only text file of `"<fingerprint-hex> u"` lines recording sets proven
//! unsatisfiable. The store is advisory: a hit saves re-expanding a subtree, a miss or an I/O
//! failure costs nothing but time. Satisfiable fingerprints are deliberately not recorded, since
//! hydrating a node as satisfiable would leave no path to extract an assignment from.
//!
//! Duplicate writes are harmless, which makes the format safe for the single-writer /
//! many-readers access pattern of the scheduler.
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::store::Fingerprint;

pub struct GlobalStore {
    path: PathBuf,
    /// Preloaded key set; `None` in no-mem mode, where every lookup scans the file.
    keys: Mutex<Option<FxHashSet<Fingerprint>>>,
    writer: Mutex<Option<BufWriter<File>>>,
    /// Set after the first I/O failure; the store then answers misses and drops writes.
    failed: AtomicBool,
}

impl GlobalStore {
    /// Open or create the store file.
    ///
    /// With `preload` the whole key set is read into memory once; otherwise lookups scan the
    /// file each time (slower, constant memory).
    pub fn open(path: impl AsRef<Path>, preload: bool) -> GlobalStore {
        let store = GlobalStore {
            path: path.as_ref().to_path_buf(),
            keys: Mutex::new(None),
            writer: Mutex::new(None),
            failed: AtomicBool::new(false),
        };

        if preload {
            match store.read_keys() {
                Ok(keys) => {
                    info!(
                        "global store '{}' loaded with {} fingerprints",
                        store.path.display(),
                        keys.len()
                    );
                    *lock(&store.keys) = Some(keys);
                }
                Err(err) => store.fail(&err),
            }
        }

        store
    }

    /// Whether the fingerprint is recorded as unsatisfiable.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        if self.failed.load(Ordering::Relaxed) {
            return false;
        }

        if let Some(keys) = lock(&self.keys).as_ref() {
            return keys.contains(fingerprint);
        }

        match self.scan_for(fingerprint) {
            Ok(found) => found,
            Err(err) => {
                self.fail(&err);
                false
            }
        }
    }

    /// Append an unsatisfiable fingerprint.
    pub fn record_unsat(&self, fingerprint: &Fingerprint) {
        if self.failed.load(Ordering::Relaxed) {
            return;
        }

        if let Some(keys) = lock(&self.keys).as_mut() {
            if !keys.insert(*fingerprint) {
                return;
            }
        }

        let mut writer = lock(&self.writer);
        let result = (|| -> std::io::Result<()> {
            if writer.is_none() {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                *writer = Some(BufWriter::new(file));
            }
            if let Some(writer) = writer.as_mut() {
                writeln!(writer, "{} u", fingerprint)?;
                writer.flush()?;
            }
            Ok(())
        })();

        if let Err(err) = result {
            self.fail(&err);
        }
    }

    fn read_keys(&self) -> std::io::Result<FxHashSet<Fingerprint>> {
        let mut keys = FxHashSet::default();
        if !self.path.exists() {
            return Ok(keys);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        for line in reader.lines() {
            if let Some(fingerprint) = parse_line(&line?) {
                keys.insert(fingerprint);
            }
        }
        Ok(keys)
    }

    fn scan_for(&self, fingerprint: &Fingerprint) -> std::io::Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        for line in reader.lines() {
            if parse_line(&line?) == Some(*fingerprint) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn fail(&self, err: &std::io::Error) {
        if !self.failed.swap(true, Ordering::Relaxed) {
            warn!(
                "global store '{}' unavailable, continuing memory-only: {}",
                self.path.display(),
                err
            );
        }
    }
}

fn parse_line(line: &str) -> Option<Fingerprint> {
    let mut tokens = line.split_whitespace();
    let fingerprint = Fingerprint::from_hex(tokens.next()?)?;
    match tokens.next() {
        Some("u") => Some(fingerprint),
        _ => None,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use splitsat_formula::set;

    #[test]
    fn record_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.db");

        let fingerprint = Fingerprint::of_set(&set![1, 2; -1;]);
        let other = Fingerprint::of_set(&set![1;]);

        {
            let store = GlobalStore::open(&path, true);
            assert!(!store.contains(&fingerprint));
            store.record_unsat(&fingerprint);
            assert!(store.contains(&fingerprint));
        }

        // preloaded reopen
        let store = GlobalStore::open(&path, true);
        assert!(store.contains(&fingerprint));
        assert!(!store.contains(&other));

        // no-mem reopen scans the file
        let store = GlobalStore::open(&path, false);
        assert!(store.contains(&fingerprint));
        assert!(!store.contains(&other));
    }

    #[test]
    fn duplicate_writes_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.db");

        let fingerprint = Fingerprint::of_set(&set![1;]);
        let store = GlobalStore::open(&path, false);
        store.record_unsat(&fingerprint);
        store.record_unsat(&fingerprint);
        drop(store);

        let store = GlobalStore::open(&path, true);
        assert!(store.contains(&fingerprint));
    }

    #[test]
    fn unreadable_store_degrades_quietly() {
        let dir = tempfile::tempdir().unwrap();
        // a directory at the store path makes every file operation fail
        let path = dir.path().join("not-a-file");
        std::fs::create_dir(&path).unwrap();

        let store = GlobalStore::open(&path, true);
        let fingerprint = Fingerprint::of_set(&set![1;]);
        store.record_unsat(&fingerprint);
        assert!(!store.contains(&fingerprint));
    }
}
