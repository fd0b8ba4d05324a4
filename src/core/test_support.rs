//! Shared fakes for exercising the update cycle without a network or a real
//! host scheduler.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;

use crate::core::scheduler::{RegistrationError, TaskRegistration, TaskScheduler};
use crate::core::source::{SourceError, UpdateSource};

/// Build a gzipped tarball from (path, contents) pairs, the same shape the
/// HTTP source serves.
pub(crate) fn make_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub(crate) struct FakeSource {
    marker: Mutex<String>,
    archive: Mutex<Vec<u8>>,
    fail_marker: AtomicBool,
    fail_fetch: AtomicBool,
    marker_calls: AtomicU32,
    fetch_calls: AtomicU32,
}

impl FakeSource {
    pub fn new(marker: &str, archive: Vec<u8>) -> Self {
        Self {
            marker: Mutex::new(marker.to_string()),
            archive: Mutex::new(archive),
            fail_marker: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            marker_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
        }
    }

    pub fn advance(&self, marker: &str, archive: Vec<u8>) {
        *self.marker.lock().unwrap() = marker.to_string();
        *self.archive.lock().unwrap() = archive;
    }

    pub fn fail_marker(&self, fail: bool) {
        self.fail_marker.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateSource for FakeSource {
    async fn current_marker(&self) -> Result<String, SourceError> {
        self.marker_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_marker.load(Ordering::SeqCst) {
            return Err(SourceError::Request("connection refused".to_string()));
        }
        Ok(self.marker.lock().unwrap().clone())
    }

    async fn fetch_archive(&self, _marker: &str) -> Result<Vec<u8>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SourceError::Request("connection reset".to_string()));
        }
        Ok(self.archive.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeScheduler {
    entries: Mutex<BTreeMap<String, TaskRegistration>>,
}

impl FakeScheduler {
    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn entry(&self, name: &str) -> Option<TaskRegistration> {
        self.entries.lock().unwrap().get(name).cloned()
    }
}

impl TaskScheduler for FakeScheduler {
    fn register(&self, task: &TaskRegistration) -> Result<(), RegistrationError> {
        self.entries
            .lock()
            .unwrap()
            .insert(task.name.clone(), task.clone());
        Ok(())
    }

    fn unregister(&self, name: &str) -> Result<(), RegistrationError> {
        self.entries.lock().unwrap().remove(name);
        Ok(())
    }

    fn is_registered(&self, name: &str) -> Result<bool, RegistrationError> {
        Ok(self.entries.lock().unwrap().contains_key(name))
    }
}
