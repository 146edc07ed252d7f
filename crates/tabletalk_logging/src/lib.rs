//! Logging setup for tabletalk binaries.
//!
//! Two sinks share one `tracing` registry: a size-rotated file under
//! `~/.tabletalk/logs/` that always receives the full filter, and stderr,
//! which stays quiet (`warn`) during an interactive session unless verbose
//! output was requested.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "tabletalk=info,tabletalk_db=info,tabletalk_llm=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration shared by tabletalk binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// An operator is typing at the terminal; keep stderr for warnings only.
    pub interactive: bool,
    /// Override the log directory (defaults to [`logs_dir`]).
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<PathBuf> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir(),
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;

    let file_writer = SharedRollingWriter::new(&log_dir, config.app_name)
        .context("Failed to initialize rolling log writer")?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.interactive && !config.verbose {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(log_dir)
}

/// The tabletalk home directory: `$TABLETALK_HOME` or `~/.tabletalk`.
pub fn tabletalk_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("TABLETALK_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tabletalk")
}

/// The logs directory: `~/.tabletalk/logs`.
pub fn logs_dir() -> PathBuf {
    tabletalk_home().join("logs")
}

/// Appends to `<name>.log`, shifting it to `<name>.log.1 .. .N` when full.
struct RotatingFile {
    dir: PathBuf,
    stem: String,
    keep: usize,
    max_size: u64,
    file: Option<File>,
    written: u64,
}

impl RotatingFile {
    fn open(dir: &Path, name: &str, keep: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut this = Self {
            dir: dir.to_path_buf(),
            stem: file_stem(name),
            keep: keep.max(1),
            max_size,
            file: None,
            written: 0,
        };
        this.reopen()?;
        if this.written > this.max_size {
            this.rotate()?;
        }
        Ok(this)
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    fn archive_path(&self, generation: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.stem, generation))
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.active_path())?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let oldest = self.keep - 1;
        if oldest > 0 {
            let last = self.archive_path(oldest);
            if last.exists() {
                fs::remove_file(&last)?;
            }
            for generation in (1..oldest).rev() {
                let from = self.archive_path(generation);
                if from.exists() {
                    fs::rename(&from, self.archive_path(generation + 1))?;
                }
            }
            let active = self.active_path();
            if active.exists() {
                fs::rename(active, self.archive_path(1))?;
            }
        } else {
            // Keeping a single file: start it over.
            File::create(self.active_path())?;
        }

        self.reopen()
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// `MakeWriter` handing out guards over one shared rotating file.
#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl SharedRollingWriter {
    fn new(dir: &Path, app_name: &str) -> Result<Self> {
        let file = RotatingFile::open(dir, app_name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
            .with_context(|| format!("Failed to open log file for {}", app_name))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

struct WriterGuard {
    inner: Arc<Mutex<RotatingFile>>,
}

impl WriterGuard {
    fn with_file<T>(&self, op: impl FnOnce(&mut RotatingFile) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        op(&mut file)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingWriter {
    type Writer = WriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        WriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for WriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|f| f.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|f| f.flush())
    }
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem("tabletalk"), "tabletalk");
        assert_eq!(file_stem("table talk/v1"), "table_talk_v1");
    }

    #[test]
    fn test_rotation_keeps_bounded_history() {
        let tmp = TempDir::new().unwrap();
        let mut file = RotatingFile::open(tmp.path(), "repl", 3, 16).unwrap();

        for line in ["0123456789abc\n", "second line!!\n", "third line!!!\n", "fourth line!!\n"] {
            file.write_all(line.as_bytes()).unwrap();
        }
        file.flush().unwrap();

        let active = fs::read_to_string(tmp.path().join("repl.log")).unwrap();
        assert_eq!(active, "fourth line!!\n");
        assert_eq!(
            fs::read_to_string(tmp.path().join("repl.log.1")).unwrap(),
            "third line!!!\n"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("repl.log.2")).unwrap(),
            "second line!!\n"
        );
        assert!(!tmp.path().join("repl.log.3").exists());
    }

    #[test]
    fn test_reopen_appends_to_existing_log() {
        let tmp = TempDir::new().unwrap();
        {
            let mut file = RotatingFile::open(tmp.path(), "repl", 2, 1024).unwrap();
            file.write_all(b"first session\n").unwrap();
        }
        let mut file = RotatingFile::open(tmp.path(), "repl", 2, 1024).unwrap();
        file.write_all(b"second session\n").unwrap();
        file.flush().unwrap();

        let active = fs::read_to_string(tmp.path().join("repl.log")).unwrap();
        assert_eq!(active, "first session\nsecond session\n");
    }
}
