#![allow(dead_code)]

use async_trait::async_trait;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use twin_cache::{CacheHandle, DigestCache, MemoryDigestCache};
use twin_catalog::{CatalogHandle, Lookup, MockCatalog, RemoteCatalog};
use twin_hash::{ChunkedHasher, ContentSource, Digest, MemorySource};
use twin_transfer::{
    FileId, FileRegistry, MemoryRegistry, Meta, Orchestrator, PreprocessProgress, RegistryHandle, StatePatch,
    TransferEvent, TransferFile, TransferResult,
};

pub const HELLO: &[u8] = b"hello world";
pub const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
pub const CHUNK_SIZE: u64 = 4;

/// Memory-backed source that counts its reads, and can be told to fail them.
pub struct CountingSource {
    inner: MemorySource,
    reads: AtomicUsize,
    failing: bool,
}
impl CountingSource {
    pub fn new(bytes: &[u8]) -> Arc<Self> {
        Arc::new(Self { inner: MemorySource::new(bytes), reads: AtomicUsize::new(0), failing: false })
    }

    pub fn failing(bytes: &[u8]) -> Arc<Self> {
        Arc::new(Self { inner: MemorySource::new(bytes), reads: AtomicUsize::new(0), failing: true })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}
#[async_trait]
impl ContentSource for CountingSource {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    async fn read_range(&self, range: Range<u64>) -> twin_hash::error::Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            exn::bail!(twin_hash::error::ErrorKind::Io(std::io::Error::other("device unplugged")));
        }
        self.inner.read_range(range).await
    }
}

/// Digest cache whose every call fails.
pub struct BrokenCache;
#[async_trait]
impl DigestCache for BrokenCache {
    async fn get(&self, _key: &str) -> twin_cache::error::Result<Option<Digest>> {
        exn::bail!(twin_cache::error::ErrorKind::Database)
    }

    async fn set(&self, _key: &str, _digest: &Digest) -> twin_cache::error::Result<()> {
        exn::bail!(twin_cache::error::ErrorKind::Database)
    }
}

/// Registry that fails the n-th (1-based) `set_file_meta` or
/// `set_file_state` call and passes everything else through.
pub struct FlakyRegistry {
    inner: Arc<MemoryRegistry>,
    fail_meta_call: Option<usize>,
    fail_state_call: Option<usize>,
    meta_calls: AtomicUsize,
    state_calls: AtomicUsize,
}
impl FlakyRegistry {
    pub fn failing_meta(inner: Arc<MemoryRegistry>, call: usize) -> Self {
        Self::new(inner, Some(call), None)
    }

    pub fn failing_state(inner: Arc<MemoryRegistry>, call: usize) -> Self {
        Self::new(inner, None, Some(call))
    }

    fn new(inner: Arc<MemoryRegistry>, fail_meta_call: Option<usize>, fail_state_call: Option<usize>) -> Self {
        Self { inner, fail_meta_call, fail_state_call, meta_calls: AtomicUsize::new(0), state_calls: AtomicUsize::new(0) }
    }

    fn trips(counter: &AtomicUsize, fail_on: Option<usize>) -> bool {
        let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
        fail_on == Some(call)
    }
}
#[async_trait]
impl FileRegistry for FlakyRegistry {
    async fn get_file(&self, id: &FileId) -> twin_transfer::error::Result<Option<TransferFile>> {
        self.inner.get_file(id).await
    }

    async fn set_file_state(&self, id: &FileId, patch: StatePatch) -> twin_transfer::error::Result<()> {
        if Self::trips(&self.state_calls, self.fail_state_call) {
            exn::bail!(twin_transfer::error::ErrorKind::UnknownFile(id.clone()));
        }
        self.inner.set_file_state(id, patch).await
    }

    async fn set_file_meta(&self, id: &FileId, patch: Meta) -> twin_transfer::error::Result<()> {
        if Self::trips(&self.meta_calls, self.fail_meta_call) {
            exn::bail!(twin_transfer::error::ErrorKind::UnknownFile(id.clone()));
        }
        self.inner.set_file_meta(id, patch).await
    }

    async fn remove_file(&self, id: &FileId) -> twin_transfer::error::Result<()> {
        self.inner.remove_file(id).await
    }

    async fn add_file(&self, file: TransferFile) -> twin_transfer::error::Result<()> {
        self.inner.add_file(file).await
    }
}

/// Catalog that gives up its turn before answering, like a network call.
pub struct YieldingCatalog(pub Arc<MockCatalog>);
#[async_trait]
impl RemoteCatalog for YieldingCatalog {
    async fn lookup(&self, digest: &str) -> twin_catalog::error::Result<Lookup> {
        tokio::task::yield_now().await;
        self.0.lookup(digest).await
    }
}

pub fn file(id: &str, name: &str, source: Arc<CountingSource>) -> TransferFile {
    TransferFile::new(id, name, source)
}

/// An orchestrator wired to in-memory collaborators.
pub struct Harness {
    pub registry: Arc<MemoryRegistry>,
    pub catalog: Arc<MockCatalog>,
    pub orchestrator: Orchestrator,
    events: UnboundedReceiver<TransferEvent>,
    results: Arc<Mutex<Vec<TransferResult>>>,
}

impl Harness {
    pub fn new(files: impl IntoIterator<Item = TransferFile>) -> Self {
        Self::with_cache(files, Arc::new(MemoryDigestCache::default()))
    }

    pub fn with_cache(files: impl IntoIterator<Item = TransferFile>, cache: CacheHandle) -> Self {
        Self::with_seams(files, cache, |registry| registry as RegistryHandle, |catalog| catalog as CatalogHandle)
    }

    /// Lets a test wrap the registry and catalog the orchestrator talks to,
    /// while `registry` and `catalog` still expose the in-memory originals.
    pub fn with_seams(
        files: impl IntoIterator<Item = TransferFile>,
        cache: CacheHandle,
        wrap_registry: impl FnOnce(Arc<MemoryRegistry>) -> RegistryHandle,
        wrap_catalog: impl FnOnce(Arc<MockCatalog>) -> CatalogHandle,
    ) -> Self {
        let registry = Arc::new(MemoryRegistry::with_files(files));
        let catalog = Arc::new(MockCatalog::default());
        let (tx, events) = mpsc::unbounded_channel();
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let orchestrator =
            Orchestrator::new(wrap_registry(registry.clone()), Arc::new(tx), cache, wrap_catalog(catalog.clone()))
            .with_hasher(ChunkedHasher::new(CHUNK_SIZE).unwrap())
            .with_result_callback(Arc::new(move |result: &TransferResult| sink.lock().unwrap().push(result.clone())));
        Self { registry, catalog, orchestrator, events, results }
    }

    pub fn results(&self) -> Vec<TransferResult> {
        self.results.lock().unwrap().clone()
    }

    /// Every event emitted so far.
    pub fn events(&mut self) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn file(&self, id: &str) -> TransferFile {
        self.registry.get_file(&FileId::from(id)).await.unwrap().unwrap()
    }
}

pub fn determinate_values(events: &[TransferEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            TransferEvent::PreprocessProgress { progress: PreprocessProgress::Determinate { value, .. }, .. } => {
                Some(*value)
            },
            _ => None,
        })
        .collect()
}
