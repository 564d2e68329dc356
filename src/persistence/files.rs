use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Paths under the tally data directory.
///
/// The directory is resolved once at startup: a local `.tally` directory
/// found by walking up from the current directory wins, otherwise the
/// global `~/.tally` is used.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Resolve the data directory (local `.tally` first, then `~/.tally`)
    pub fn resolve() -> Result<Self> {
        let current_dir = env::current_dir().context("Could not determine current directory")?;
        if let Some(local) = find_local_dir(&current_dir) {
            return Ok(Self { root: local });
        }

        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(Self {
            root: home.join(".tally"),
        })
    }

    /// Use an explicit root (tests, alternate locations)
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the data directory if missing. Failure here is fatal at
    /// startup; running without a usable data directory is not supported.
    pub fn ensure(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)
                .with_context(|| format!("Failed to create directory: {}", self.root.display()))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Live task document
    pub fn tasks_file(&self) -> PathBuf {
        self.root.join("tasks.json")
    }

    /// Settings document
    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    /// Dated archive document (one JSON array per calendar day)
    pub fn archive_file(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join("archives")
            .join(format!("completed_tasks_{}.json", date.format("%Y%m%d")))
    }

    /// Timestamped backup of the live task document
    pub fn backup_file(&self, stamp: DateTime<Local>) -> PathBuf {
        self.root
            .join("backups")
            .join(format!("tasks_{}.json", stamp.format("%Y%m%d%H%M%S")))
    }
}

/// Find a local `.tally` directory by walking up the directory tree
fn find_local_dir(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let data_dir = current.join(".tally");
        if data_dir.exists() && data_dir.is_dir() {
            return Some(data_dir);
        }
        current = current.parent()?;
    }
}

/// Initialize a local `.tally` directory in the current directory
pub fn init_local_dir() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;
    let data_dir = current_dir.join(".tally");

    if data_dir.exists() {
        anyhow::bail!("Data directory already exists: {}", data_dir.display());
    }

    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create directory: {}", data_dir.display()))?;

    Ok(data_dir)
}

/// Atomically write content to a file using temp file + rename.
/// Creates the parent directory if it does not exist yet.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().context("File path has no parent directory")?;

    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let mut temp_file = NamedTempFile::new_in(dir).context("Failed to create temporary file")?;

    temp_file
        .write_all(content.as_bytes())
        .context("Failed to write to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .context("Failed to sync temporary file")?;

    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file: {}", path.display()))?;

    Ok(())
}

/// Read file content, return empty string if the file doesn't exist
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}
