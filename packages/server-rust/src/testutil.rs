//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::progress::ProgressLog;
use crate::service::{CacheWarmer, ReadPath, WarmerConfig, WarmerTask};
use crate::storage::datastores::MemoryRecordSource;
use crate::storage::engines::MemoryCacheEngine;
use crate::storage::{CacheConfig, CacheEngine, CacheError, PageCache};
use crate::traits::{JobQueue, RecordSource};

/// A progress log in a temp dir, an in-memory cache and a seeded source.
pub struct Fixture {
    _dir: TempDir,
    pub log: Arc<ProgressLog>,
    pub cache: Arc<PageCache>,
    pub source: Arc<MemoryRecordSource>,
}

impl Fixture {
    pub fn new(seed: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(ProgressLog::open(dir.path().join("progress.log")).unwrap());
        let cache = Arc::new(PageCache::new(
            Arc::new(MemoryCacheEngine::new()),
            CacheConfig::default(),
        ));
        Self {
            _dir: dir,
            log,
            cache,
            source: Arc::new(MemoryRecordSource::seeded(seed)),
        }
    }

    pub fn warmer(&self) -> CacheWarmer {
        self.warmer_with(self.source.clone())
    }

    pub fn warmer_with(&self, source: Arc<dyn RecordSource>) -> CacheWarmer {
        CacheWarmer::new(
            source,
            self.cache.clone(),
            self.log.clone(),
            WarmerConfig::default(),
        )
    }

    pub fn read_path(&self, page_size: usize) -> ReadPath {
        ReadPath::new(self.source.clone(), self.cache.clone(), page_size)
    }
}

/// Job queue that only records what it was given.
#[derive(Default)]
pub struct RecordingQueue {
    pub tasks: Mutex<Vec<WarmerTask>>,
    pub fail: bool,
}

impl RecordingQueue {
    pub fn failing() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn taken(&self) -> Vec<WarmerTask> {
        self.tasks.lock().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, task: WarmerTask) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("queue closed");
        }
        self.tasks.lock().push(task);
        Ok(())
    }
}

/// Cache engine whose every operation reports the backend as down.
pub struct DownCacheEngine;

impl DownCacheEngine {
    fn down<T>() -> Result<T, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

impl CacheEngine for DownCacheEngine {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Self::down()
    }

    fn contains(&self, _key: &str) -> Result<bool, CacheError> {
        Self::down()
    }

    fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Self::down()
    }

    fn add(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<bool, CacheError> {
        Self::down()
    }

    fn update(
        &self,
        _key: &str,
        _ttl: Option<Duration>,
        _f: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<(), CacheError> {
        Self::down()
    }

    fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Self::down()
    }

    fn delete_many(&self, _keys: &[String]) -> Result<usize, CacheError> {
        Self::down()
    }

    fn len(&self) -> usize {
        0
    }
}
