// Job table backed by the `crontab` binary

use std::ffi::OsStr;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

use super::{CrontabDocument, JobTable};
use crate::error::CrontabError;

/// Diagnostic printed by `crontab -l` when the user has no table yet.
const NO_CRONTAB_MARKER: &str = "no crontab";

const DEFAULT_CRONTAB_BIN: &str = "crontab";

/// Shells out to `crontab -l` / `crontab <file>`. Blocking.
#[derive(Debug, Clone)]
pub struct SystemCrontab {
    bin: PathBuf,
}

impl Default for SystemCrontab {
    fn default() -> Self {
        Self::new(DEFAULT_CRONTAB_BIN)
    }
}

impl SystemCrontab {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    fn run(&self, step: &'static str, arg: &OsStr) -> Result<Output, CrontabError> {
        Command::new(&self.bin)
            .arg(arg)
            .output()
            .map_err(|source| CrontabError::Spawn { step, source })
    }
}

impl JobTable for SystemCrontab {
    fn read(&self) -> Result<CrontabDocument, CrontabError> {
        let out = self.run("list", OsStr::new("-l"))?;
        let stderr = String::from_utf8_lossy(&out.stderr);
        if stderr.contains(NO_CRONTAB_MARKER) {
            return Ok(CrontabDocument::uninitialized());
        }
        if !out.status.success() {
            return Err(CrontabError::Failed {
                step: "list",
                status: out.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        // Invalid bytes become U+FFFD; lines without them still round-trip unchanged.
        let text = match String::from_utf8(out.stdout) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    valid_up_to = e.utf8_error().valid_up_to(),
                    "crontab output is not valid utf-8; invalid bytes replaced"
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(CrontabDocument::from_text(text))
    }

    fn install(&self, text: &str) -> Result<(), CrontabError> {
        let mut file = tempfile::Builder::new()
            .prefix("croncommand")
            .suffix(".txt")
            .tempfile()
            .map_err(CrontabError::TempFile)?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .map_err(CrontabError::TempFile)?;

        let result = self.run("install", file.path().as_os_str());

        // Removed whether or not the install worked.
        let path = file.path().to_path_buf();
        if let Err(e) = file.close() {
            tracing::warn!(error = %e, path = %path.display(), "failed to remove cron file");
        }

        let out = result?;
        if !out.status.success() {
            return Err(CrontabError::Failed {
                step: "install",
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
