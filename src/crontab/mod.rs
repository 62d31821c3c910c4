// Job table (crontab) management: read, transform, reinstall, confirm.
// Every mutation goes through the full cycle; the table is never patched in place.

mod memory;
mod system;

pub use memory::InMemoryJobTable;
pub use system::SystemCrontab;

use tracing::instrument;

use crate::error::CrontabError;

/// Narrow capability over the OS job table.
pub trait JobTable {
    /// Current table content. A user without a table yields [`CrontabDocument::uninitialized`].
    fn read(&self) -> Result<CrontabDocument, CrontabError>;

    /// Replaces the whole table with `text`.
    fn install(&self, text: &str) -> Result<(), CrontabError>;
}

/// Full text of a job table, or the "no table yet" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrontabDocument {
    text: Option<String>,
}

impl CrontabDocument {
    pub fn uninitialized() -> Self {
        Self { text: None }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn is_uninitialized(&self) -> bool {
        self.text.is_none()
    }

    /// Table text; empty for an uninitialized table.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Lines without their terminators.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text().lines()
    }

    /// Number of lines exactly equal to `line`.
    pub fn count_line(&self, line: &str) -> usize {
        self.lines().filter(|l| *l == line).count()
    }

    pub fn contains_line(&self, line: &str) -> bool {
        self.count_line(line) > 0
    }

    /// Appends `line` plus a newline. Duplicates are not checked.
    pub fn with_line_appended(&self, line: &str) -> Self {
        let mut text = self.text().to_string();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(line);
        text.push('\n');
        Self::from_text(text)
    }

    /// Drops every line exactly equal to `line`; other lines (including ones that merely
    /// contain it) keep their content and terminators. Returns the new document and the number
    /// of lines removed.
    pub fn without_line(&self, line: &str) -> (Self, usize) {
        let mut removed = 0;
        let text: String = self
            .text()
            .split_inclusive('\n')
            .filter(|raw| {
                let content = raw.strip_suffix('\n').unwrap_or(raw);
                let content = content.strip_suffix('\r').unwrap_or(content);
                if content == line {
                    removed += 1;
                    false
                } else {
                    true
                }
            })
            .collect();
        (Self::from_text(text), removed)
    }
}

/// Adds and removes single job lines. Calls must be serialized by the caller.
pub struct CrontabManager<T: JobTable> {
    table: T,
}

impl<T: JobTable> CrontabManager<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn list(&self) -> Result<CrontabDocument, CrontabError> {
        self.table.read()
    }

    pub fn contains(&self, command: &str) -> Result<bool, CrontabError> {
        Ok(self.table.read()?.contains_line(command))
    }

    /// Appends `command` as a new line and returns the reinstalled table text.
    /// Adding the same command twice produces two entries.
    #[instrument(skip(self), fields(component = "crontab", operation = "add"))]
    pub fn add_cron_job(&self, command: &str) -> Result<String, CrontabError> {
        check_single_line(command)?;
        let current = self.table.read()?;
        if current.is_uninitialized() {
            tracing::debug!("empty crontab");
        }
        let next = current.with_line_appended(command);
        self.install_and_confirm(&next)
    }

    /// Removes every line equal to `command` and returns the reinstalled table text.
    /// Nothing matching means nothing is installed; the current text is returned as is.
    #[instrument(skip(self), fields(component = "crontab", operation = "remove"))]
    pub fn remove_cron_job(&self, command: &str) -> Result<String, CrontabError> {
        check_single_line(command)?;
        let current = self.table.read()?;
        let (next, removed) = current.without_line(command);
        if removed == 0 {
            tracing::debug!("no matching cron line; table left untouched");
            return Ok(current.text().to_string());
        }
        tracing::debug!(removed, "removing cron lines");
        self.install_and_confirm(&next)
    }

    fn install_and_confirm(&self, next: &CrontabDocument) -> Result<String, CrontabError> {
        self.table.install(next.text())?;
        let confirmed = self.table.read()?;
        tracing::info!(lines = confirmed.lines().count(), "crontab installed");
        Ok(confirmed.text().to_string())
    }
}

fn check_single_line(command: &str) -> Result<(), CrontabError> {
    if command.trim().is_empty() || command.contains(['\n', '\r']) {
        return Err(CrontabError::InvalidLine(command.to_string()));
    }
    Ok(())
}
