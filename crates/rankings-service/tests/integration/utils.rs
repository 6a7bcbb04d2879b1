use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use rankings_service::config::Config;
use rankings_service::services::{RankingService, Services, append_records, create_services};
use rankings_service::store::{JsonFileStore, RecordSource, StoreError};
use rankings_service::types::BusinessRecord;
use rankings_test as test;

pub use test::assert_close;

/// Setup tests and create the services on top of a data file in a temporary directory.
///
/// The data file does not exist initially. The directory is cleaned up when the [`test::TempDir`]
/// instance is dropped, keep it as guard until the test has finished.
pub fn setup_services(update_config: impl FnOnce(&mut Config)) -> (Services, test::TempDir) {
    test::setup();

    let data_dir = test::tempdir();
    let mut config = Config {
        data_path: data_dir.path().join("dados_comercios.json"),
        ..Default::default()
    };
    update_config(&mut config);

    (create_services(&config), data_dir)
}

/// The location of the data file created by [`setup_services`].
pub fn data_path(dir: &test::TempDir) -> PathBuf {
    dir.path().join("dados_comercios.json")
}

/// Writes `count` generated records to the data file at `path`, replacing its contents.
pub fn write_generated(path: &Path, count: usize) {
    let store = JsonFileStore::new(path);
    store.replace(&[]).unwrap();
    append_records(&store, count).unwrap();
}

/// Loads the data file at `path` back.
pub fn read_records(path: &Path) -> Vec<BusinessRecord> {
    JsonFileStore::new(path).load().unwrap()
}

/// A record source in front of a [`JsonFileStore`] that counts loads and can be slowed down.
#[derive(Debug)]
pub struct CountingSource {
    store: JsonFileStore,
    loads: AtomicUsize,
    delay_ms: AtomicU64,
}

impl CountingSource {
    pub fn new(path: &Path) -> Arc<Self> {
        Arc::new(Self {
            store: JsonFileStore::new(path),
            loads: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
        })
    }

    /// Makes every following load block for `delay` after reading the file.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl RecordSource for CountingSource {
    fn load(&self) -> Result<Vec<BusinessRecord>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let records = self.store.load();
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        records
    }
}

/// Creates a ranking service that reads through a [`CountingSource`].
pub fn counting_service(
    path: &Path,
    update_config: impl FnOnce(&mut Config),
) -> (Arc<CountingSource>, RankingService) {
    test::setup();

    let mut config = Config::default();
    update_config(&mut config);

    let source = CountingSource::new(path);
    let service = RankingService::new(source.clone(), config.caches);
    (source, service)
}
