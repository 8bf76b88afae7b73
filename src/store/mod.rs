//! Disk-Backed State Store (C5): named-state persistence under a fixed byte
//! budget.
//!
//! Directory layout and per-subdirectory byte accounting are grounded on
//! `original_source/data/storage.py::TelemetryStorage` (`events/`,
//! `metrics/`, `snapshots/`, `exports/` subfolders plus
//! `get_storage_stats()`'s per-folder file-count/size breakdown), adapted
//! from JSONL telemetry files to one binary `.qs` file per named state.
//! Atomic write-then-rename is a standard Rust idiom; no crate in the
//! example pack reaches for a user-data-dir helper, so the default root is
//! resolved from `$HOME` by hand.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::math::C;

const MAGIC: &[u8; 8] = b"QFORGE01";
const FORMAT_VERSION: u16 = 1;

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub root_path: PathBuf,
    pub allocated_bytes: u64,
    pub max_qubits: u8,
    pub max_time_steps: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_path: default_root(),
            allocated_bytes: 20 * 1024 * 1024 * 1024,
            max_qubits: 18,
            max_time_steps: 10_000,
        }
    }
}

fn default_root() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    home.join(".qforge").join("synthesis_data")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamedStateRecord {
    pub name: String,
    pub n_qubits: u8,
    pub bytes: u64,
    pub created_at: i64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SubdirStats {
    pub files: u64,
    pub size_bytes: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageSnapshot {
    pub allocated_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub used_percent: f64,
    pub states: SubdirStats,
    pub results: SubdirStats,
    pub cache: SubdirStats,
}

struct Inner {
    config: StoreConfig,
}

/// Persists named quantum states to disk. All mutating and listing
/// operations hold a single store-level mutex; there is no lock-free
/// concurrent path.
pub struct StateStore {
    inner: Mutex<Inner>,
}

impl StateStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        for sub in ["states", "results", "cache"] {
            fs::create_dir_all(config.root_path.join(sub))?;
        }
        info!(root = %config.root_path.display(), "state store ready");
        Ok(Self { inner: Mutex::new(Inner { config }) })
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidName("state name must not be empty".into()));
        }
        for forbidden in ['/', '\\', ':'] {
            if name.contains(forbidden) {
                return Err(Error::InvalidName(format!(
                    "state name must not contain '{forbidden}'"
                )));
            }
        }
        if name.contains("..") {
            return Err(Error::InvalidName("state name must not contain '..'".into()));
        }
        Ok(())
    }

    fn states_dir(config: &StoreConfig) -> PathBuf {
        config.root_path.join("states")
    }

    fn state_path(config: &StoreConfig, name: &str) -> PathBuf {
        Self::states_dir(config).join(format!("{name}.qs"))
    }

    fn dir_stats(path: &Path) -> SubdirStats {
        let mut files = 0u64;
        let mut size_bytes = 0u64;
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                if let Ok(meta) = entry.metadata() {
                    if meta.is_file() {
                        files += 1;
                        size_bytes += meta.len();
                    }
                }
            }
        }
        SubdirStats { files, size_bytes }
    }

    fn used_bytes(config: &StoreConfig) -> u64 {
        ["states", "results", "cache"]
            .iter()
            .map(|sub| Self::dir_stats(&config.root_path.join(sub)).size_bytes)
            .sum()
    }

    fn encode(n_qubits: u8, created_at: i64, description: &str, amplitudes: &[C]) -> Vec<u8> {
        let description_bytes = description.as_bytes();
        let mut buf = Vec::with_capacity(
            8 + 2 + 1 + 8 + 2 + description_bytes.len() + amplitudes.len() * 16,
        );
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.push(n_qubits);
        buf.extend_from_slice(&created_at.to_le_bytes());
        buf.extend_from_slice(&(description_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(description_bytes);
        for z in amplitudes {
            buf.extend_from_slice(&z.re.to_le_bytes());
            buf.extend_from_slice(&z.im.to_le_bytes());
        }
        buf
    }

    fn decode(bytes: &[u8]) -> Result<(u8, i64, String, Vec<C>)> {
        if bytes.len() < 8 + 2 + 1 + 8 + 2 || &bytes[0..8] != MAGIC {
            return Err(Error::Corrupt("bad magic".into()));
        }
        let version = u16::from_le_bytes([bytes[8], bytes[9]]);
        if version != FORMAT_VERSION {
            return Err(Error::Corrupt(format!("unsupported format version {version}")));
        }
        let n_qubits = bytes[10];
        let created_at = i64::from_le_bytes(bytes[11..19].try_into().unwrap());
        let description_len = u16::from_le_bytes([bytes[19], bytes[20]]) as usize;
        let header_end = 21 + description_len;
        if bytes.len() < header_end {
            return Err(Error::Corrupt("truncated description".into()));
        }
        let description = String::from_utf8(bytes[21..header_end].to_vec())
            .map_err(|_| Error::Corrupt("description is not valid UTF-8".into()))?;

        let dim = 1usize << n_qubits;
        let expected_len = header_end + dim * 16;
        if bytes.len() != expected_len {
            return Err(Error::Corrupt(format!(
                "expected {expected_len} bytes for n_qubits={n_qubits}, got {}",
                bytes.len()
            )));
        }
        let mut amplitudes = Vec::with_capacity(dim);
        let mut offset = header_end;
        for _ in 0..dim {
            let re = f64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
            let im = f64::from_le_bytes(bytes[offset + 8..offset + 16].try_into().unwrap());
            amplitudes.push(C::new(re, im));
            offset += 16;
        }
        Ok((n_qubits, created_at, description, amplitudes))
    }

    /// Writes `name.qs` atomically (tmp file + rename). Rejects reserved
    /// characters in `name` and fails `OutOfSpace` if writing would exceed
    /// the configured budget; no implicit eviction.
    pub fn save_state(&self, name: &str, amplitudes: &[C], description: Option<&str>) -> Result<PathBuf> {
        Self::validate_name(name)?;
        if amplitudes.is_empty() || amplitudes.len() & (amplitudes.len() - 1) != 0 {
            return Err(Error::InvalidArgument(
                "amplitude count must be a power of two".into(),
            ));
        }
        let n_qubits = amplitudes.len().trailing_zeros() as u8;
        let inner = self.inner.lock();
        if n_qubits as usize > inner.config.max_qubits as usize {
            return Err(Error::Capacity(format!(
                "n_qubits={n_qubits} exceeds store max_qubits={}",
                inner.config.max_qubits
            )));
        }
        let created_at = now_unix_ms();
        let payload = Self::encode(n_qubits, created_at, description.unwrap_or(""), amplitudes);

        let used = Self::used_bytes(&inner.config);
        if used + payload.len() as u64 > inner.config.allocated_bytes {
            warn!(name, used, size = payload.len(), "save_state would exceed budget");
            return Err(Error::OutOfSpace(format!(
                "writing {} would exceed the {}-byte budget ({} already used)",
                payload.len(),
                inner.config.allocated_bytes,
                used
            )));
        }

        let final_path = Self::state_path(&inner.config, name);
        let tmp_path = final_path.with_extension("qs.tmp");
        {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(&payload)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        debug!(name, bytes = payload.len(), "state saved");
        Ok(final_path)
    }

    /// Returns a fresh owned `ψ` and its qubit count.
    pub fn load_state(&self, name: &str) -> Result<(u8, Vec<C>)> {
        Self::validate_name(name)?;
        let inner = self.inner.lock();
        let path = Self::state_path(&inner.config, name);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("no state named '{name}'")))
            }
            Err(e) => return Err(Error::IoError(e)),
        };
        let (n_qubits, _created_at, _description, amplitudes) = Self::decode(&bytes)?;
        debug!(name, n_qubits, "state loaded");
        Ok((n_qubits, amplitudes))
    }

    /// Idempotent; returns whether a file existed.
    pub fn delete_state(&self, name: &str) -> Result<bool> {
        Self::validate_name(name)?;
        let inner = self.inner.lock();
        let path = Self::state_path(&inner.config, name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(name, "state deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(name, "delete_state found nothing to delete");
                Ok(false)
            }
            Err(e) => Err(Error::IoError(e)),
        }
    }

    /// Ordered by `created_at` ascending.
    pub fn list_states(&self) -> Result<Vec<NamedStateRecord>> {
        let inner = self.inner.lock();
        let dir = Self::states_dir(&inner.config);
        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("qs") {
                continue;
            }
            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(s) => s.to_string(),
                None => continue,
            };
            let mut bytes = Vec::new();
            fs::File::open(&path)?.read_to_end(&mut bytes)?;
            let (n_qubits, created_at, _description, amplitudes) = Self::decode(&bytes)?;
            records.push(NamedStateRecord {
                name,
                n_qubits,
                bytes: (amplitudes.len() * 16) as u64,
                created_at,
            });
        }
        records.sort_by_key(|r| r.created_at);
        debug!(count = records.len(), "listed states");
        Ok(records)
    }

    pub fn storage(&self) -> Result<StorageSnapshot> {
        let inner = self.inner.lock();
        let states = Self::dir_stats(&inner.config.root_path.join("states"));
        let results = Self::dir_stats(&inner.config.root_path.join("results"));
        let cache = Self::dir_stats(&inner.config.root_path.join("cache"));
        let used_bytes = states.size_bytes + results.size_bytes + cache.size_bytes;
        let allocated_bytes = inner.config.allocated_bytes;
        Ok(StorageSnapshot {
            allocated_bytes,
            used_bytes,
            available_bytes: allocated_bytes.saturating_sub(used_bytes),
            used_percent: if allocated_bytes > 0 {
                100.0 * used_bytes as f64 / allocated_bytes as f64
            } else {
                0.0
            },
            states,
            results,
            cache,
        })
    }

    pub fn root_path(&self) -> PathBuf {
        self.inner.lock().config.root_path.clone()
    }

    pub fn max_qubits(&self) -> u8 {
        self.inner.lock().config.max_qubits
    }

    pub fn max_time_steps(&self) -> usize {
        self.inner.lock().config.max_time_steps
    }
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> StateStore {
        StateStore::new(StoreConfig {
            root_path: dir.to_path_buf(),
            allocated_bytes: 1024 * 1024,
            max_qubits: 18,
            max_time_steps: 10_000,
        })
        .unwrap()
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let amplitudes = vec![
            C::new(std::f64::consts::FRAC_1_SQRT_2, 0.0),
            C::new(std::f64::consts::FRAC_1_SQRT_2, 0.0),
        ];
        store.save_state("plus", &amplitudes, Some("test state")).unwrap();
        let (n_qubits, loaded) = store.load_state("plus").unwrap();
        assert_eq!(n_qubits, 1);
        let diff: f64 = amplitudes
            .iter()
            .zip(loaded.iter())
            .map(|(a, b)| (a - b).norm_sqr())
            .sum::<f64>()
            .sqrt();
        assert!(diff < 1e-12);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.save_state("x", &[C::new(1.0, 0.0)], None).unwrap();
        assert!(store.delete_state("x").unwrap());
        assert!(!store.delete_state("x").unwrap());
    }

    #[test]
    fn invalid_name_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let err = store.save_state("../x", &[C::new(1.0, 0.0)], None).unwrap_err();
        assert_eq!(err.tag(), "InvalidName");
    }

    #[test]
    fn load_missing_state_not_found() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let err = store.load_state("ghost").unwrap_err();
        assert_eq!(err.tag(), "NotFound");
    }

    #[test]
    fn out_of_space_when_budget_exceeded() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(StoreConfig {
            root_path: dir.path().to_path_buf(),
            allocated_bytes: 16,
            max_qubits: 18,
            max_time_steps: 10_000,
        })
        .unwrap();
        let err = store.save_state("big", &[C::new(1.0, 0.0), C::new(0.0, 0.0)], None).unwrap_err();
        assert_eq!(err.tag(), "OutOfSpace");
        assert!(store.list_states().unwrap().is_empty());
    }

    #[test]
    fn list_states_ordered_by_created_at() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.save_state("a", &[C::new(1.0, 0.0)], None).unwrap();
        store.save_state("b", &[C::new(1.0, 0.0)], None).unwrap();
        let listed = store.list_states().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at <= listed[1].created_at);
    }

    #[test]
    fn storage_snapshot_within_budget() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.save_state("s", &[C::new(1.0, 0.0)], None).unwrap();
        let snap = store.storage().unwrap();
        assert!(snap.used_bytes <= snap.allocated_bytes);
        assert!(snap.states.files >= 1);
    }
}
