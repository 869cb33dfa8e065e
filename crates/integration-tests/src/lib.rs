//! Shared fixtures for the cross-crate scenarios in `tests/`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rs_core::{Engine, EngineSettings};
use rs_db_memory::MemoryStore;
use rs_db_sqlite::SqliteStore;
use rs_identity_simple::Sha256Fingerprinter;

pub fn hasher() -> Arc<Sha256Fingerprinter> {
    Arc::new(Sha256Fingerprinter::unpeppered())
}

pub fn memory_engine() -> Engine {
    Engine::new(Arc::new(MemoryStore::new()), hasher(), EngineSettings::default())
}

pub async fn sqlite_engine() -> Engine {
    let store = SqliteStore::new("sqlite::memory:")
        .await
        .expect("in-memory sqlite should open");
    Engine::new(Arc::new(store), hasher(), EngineSettings::default())
}

/// One engine per backend, labelled for assertion messages.
pub async fn engines() -> Vec<(&'static str, Engine)> {
    vec![("memory", memory_engine()), ("sqlite", sqlite_engine().await)]
}

/// A throwaway on-disk SQLite database, so a pool can hold several real
/// connections. Files are removed on drop.
pub struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("rusty-shelf-{}.db", uuid::Uuid::now_v7()));
        Self { path }
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    pub async fn open(&self, max_connections: u32) -> SqliteStore {
        SqliteStore::connect(&self.url(), max_connections, Duration::from_secs(10))
            .await
            .expect("file-backed sqlite should open")
    }
}

impl Default for TempDb {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}
