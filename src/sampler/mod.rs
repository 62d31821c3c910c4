// Host memory sampling via sysinfo

mod linux;

use std::sync::{Arc, Mutex};

use sysinfo::System;
use tracing::instrument;

use crate::error::SampleError;
use crate::models::{MemorySample, RawMemory};

/// Source of raw memory byte counts. Implementations block; the sampler calls them on the
/// blocking pool.
pub trait MemoryProvider: Send + Sync + 'static {
    fn read_memory(&self) -> Result<RawMemory, SampleError>;
}

/// Production provider: total/used/free from sysinfo, page cache from /proc/meminfo.
pub struct SysinfoProvider {
    sys: Mutex<System>,
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProvider {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl MemoryProvider for SysinfoProvider {
    fn read_memory(&self) -> Result<RawMemory, SampleError> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|e| SampleError::Provider(format!("sysinfo lock poisoned: {}", e)))?;
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            // sysinfo reports zeros on platforms it cannot read.
            return Err(SampleError::Provider(
                "memory statistics unavailable on this host".into(),
            ));
        }

        Ok(RawMemory {
            total,
            used: sys.used_memory(),
            cached: linux::read_cached_bytes_linux().unwrap_or(0),
            free: sys.free_memory(),
        })
    }
}

/// Turns provider readings into decimal-megabyte samples.
#[derive(Clone)]
pub struct MemorySampler {
    provider: Arc<dyn MemoryProvider>,
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler {
    pub fn new() -> Self {
        Self::with_provider(Arc::new(SysinfoProvider::new()))
    }

    pub fn with_provider(provider: Arc<dyn MemoryProvider>) -> Self {
        Self { provider }
    }

    /// Takes one sample. A failed provider read yields an error, never a zeroed sample.
    #[instrument(skip(self), fields(component = "sampler", operation = "sample"))]
    pub async fn sample(&self) -> Result<MemorySample, SampleError> {
        let provider = self.provider.clone();
        let raw = tokio::task::spawn_blocking(move || provider.read_memory())
            .await
            .map_err(|e| SampleError::Join(e.to_string()))??;

        let sample = MemorySample::from(raw);
        tracing::debug!(
            total_mb = sample.total,
            used_mb = sample.used,
            cached_mb = sample.cached,
            free_mb = sample.free,
            "memory sampled"
        );
        Ok(sample)
    }
}
