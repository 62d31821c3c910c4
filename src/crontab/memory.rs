// In-memory job table for tests and dry runs

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{CrontabDocument, JobTable};
use crate::error::CrontabError;

#[derive(Debug, Default)]
pub struct InMemoryJobTable {
    doc: Mutex<CrontabDocument>,
    installs: AtomicUsize,
    fail_install: AtomicBool,
}

impl InMemoryJobTable {
    /// Starts as a user with no table at all.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            doc: Mutex::new(CrontabDocument::from_text(text)),
            ..Self::default()
        }
    }

    pub fn document(&self) -> CrontabDocument {
        self.doc.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::Relaxed)
    }

    /// Makes subsequent installs fail, as a rejected crontab file would.
    pub fn set_fail_install(&self, fail: bool) {
        self.fail_install.store(fail, Ordering::Relaxed);
    }
}

impl JobTable for InMemoryJobTable {
    fn read(&self) -> Result<CrontabDocument, CrontabError> {
        self.doc
            .lock()
            .map(|d| d.clone())
            .map_err(|e| CrontabError::Unavailable(e.to_string()))
    }

    fn install(&self, text: &str) -> Result<(), CrontabError> {
        if self.fail_install.load(Ordering::Relaxed) {
            return Err(CrontabError::Failed {
                step: "install",
                status: "exit status: 1".into(),
                stderr: "errors in crontab file, can't install".into(),
            });
        }
        let mut doc = self
            .doc
            .lock()
            .map_err(|e| CrontabError::Unavailable(e.to_string()))?;
        *doc = CrontabDocument::from_text(text);
        self.installs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
