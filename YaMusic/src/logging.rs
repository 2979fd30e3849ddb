//! Initialisation du logging tracing

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use yaconfig::Config;

/// Where log lines go
pub enum LogTarget {
    /// The configured log file, the terminal belongs to the UI
    File,
    /// The engine process: its stderr is read by the player
    Stderr,
}

/// `RUST_LOG` wins over `logger.min_level`
pub fn init_tracing(config: &Config, target: LogTarget) {
    let _ = tracing_log::LogTracer::init();
    let writer = match target {
        LogTarget::File => log_writer(&config.get_log_file()),
        LogTarget::Stderr => BoxMakeWriter::new(io::stderr),
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.get_log_min_level()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
}

fn log_writer(path: &Path) -> BoxMakeWriter {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let shared = SharedLogWriter::new(file);
            BoxMakeWriter::new(move || shared.clone())
        }
        Err(err) => {
            eprintln!(
                "Impossible d'ouvrir {} pour les logs: {}. Logs désactivés",
                path.display(),
                err
            );
            BoxMakeWriter::new(io::sink)
        }
    }
}

#[derive(Clone)]
struct SharedLogWriter {
    inner: Arc<Mutex<File>>,
}

impl SharedLogWriter {
    fn new(file: File) -> Self {
        Self {
            inner: Arc::new(Mutex::new(file)),
        }
    }
}

impl Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}
