//! Process-wide file logging.
//!
//! # Responsibility
//! - Start one rolling `flexi_logger` file writer per process.
//! - Route panics through the log before the default hook runs.
//!
//! # Invariants
//! - A second init with identical settings is a no-op; differing settings
//!   are rejected and the active logger is kept.
//! - Nothing in here panics.

use crate::config::Configuration;
use flexi_logger::{
    detailed_format, Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming,
    WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const FILE_BASENAME: &str = "tagstore";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED: usize = 4;
const PANIC_PAYLOAD_LIMIT: usize = 200;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub dir: PathBuf,
}

impl LogSettings {
    /// Validates a textual level and an absolute directory.
    pub fn parse(level: &str, dir: &str) -> Result<Self, LoggingError> {
        let level = match level.trim().to_ascii_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" | "warning" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => return Err(LoggingError::UnknownLevel(level.trim().to_string())),
        };

        let dir = Path::new(dir.trim());
        if dir.as_os_str().is_empty() || !dir.is_absolute() {
            return Err(LoggingError::RelativeDir(dir.to_path_buf()));
        }
        Ok(Self {
            level,
            dir: dir.to_path_buf(),
        })
    }
}

#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    RelativeDir(PathBuf),
    CreateDir(PathBuf, std::io::Error),
    Start(flexi_logger::FlexiLoggerError),
    /// Logging already runs with other settings.
    AlreadyActive(LogSettings),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(level) => write!(
                f,
                "unknown log level `{level}`; use trace, debug, info, warn, error or off"
            ),
            Self::RelativeDir(dir) => {
                write!(f, "log directory must be absolute, got `{}`", dir.display())
            }
            Self::CreateDir(dir, err) => write!(f, "cannot create `{}`: {err}", dir.display()),
            Self::Start(err) => write!(f, "logger did not start: {err}"),
            Self::AlreadyActive(active) => write!(
                f,
                "logging is already active at level {} in `{}`",
                active.level,
                active.dir.display()
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir(_, err) => Some(err),
            Self::Start(err) => Some(err),
            _ => None,
        }
    }
}

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Starts file logging at `level` in `log_dir`.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let requested = LogSettings::parse(level, log_dir)?;
    let active = ACTIVE.get_or_try_init(|| start(requested.clone()))?;
    if active.settings != requested {
        return Err(LoggingError::AlreadyActive(active.settings.clone()));
    }
    Ok(())
}

/// Starts logging when `config` names a log directory; `Ok(false)` otherwise.
pub fn init_logging_from_config(config: &Configuration) -> Result<bool, LoggingError> {
    match config.log_dir.as_deref() {
        Some(dir) => {
            let level = config.log_level.as_deref().unwrap_or(default_log_level());
            init_logging(level, dir).map(|()| true)
        }
        None => Ok(false),
    }
}

/// Settings of the running logger, if any.
pub fn logging_status() -> Option<LogSettings> {
    ACTIVE.get().map(|active| active.settings.clone())
}

pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(settings: LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir)
        .map_err(|err| LoggingError::CreateDir(settings.dir.clone(), err))?;

    let spec = LogSpecification::builder().default(settings.level).build();
    let handle = Logger::with(spec)
        .log_to_file(
            FileSpec::default()
                .directory(&settings.dir)
                .basename(FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED),
        )
        .append()
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .start()
        .map_err(LoggingError::Start)?;

    hook_panics();
    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} version={}",
        settings.level,
        settings.dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        settings,
        _handle: handle,
    })
}

fn hook_panics() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let chained = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let at = info
            .location()
            .map_or_else(|| "?".to_string(), |at| format!("{}:{}", at.file(), at.line()));
        let payload = info.payload();
        let message = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&str>().copied())
            .unwrap_or("<non-string payload>");
        error!(
            "event=panic module=logging status=error location={} payload={}",
            at,
            one_line(message, PANIC_PAYLOAD_LIMIT)
        );
        chained(info);
    }));
}

/// Flattens `text` onto one line and cuts it to `limit` chars.
fn one_line(text: &str, limit: usize) -> String {
    let mut out: String = text
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .take(limit)
        .collect();
    if text.chars().nth(limit).is_some() {
        out.push('…');
    }
    out
}
