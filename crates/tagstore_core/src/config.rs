//! Process configuration and repository bootstrap.
//!
//! # Responsibility
//! - Read storage locations and logging options from the environment.
//! - Wire record store, relationship index and rebuild into one repository.
//!
//! # Invariants
//! - An absent database path selects in-memory storage.
//! - The record store and a file-backed index never share a database file.

use crate::index::{open_index, IndexError, RelationshipIndex};
use crate::repo::{RepoError, Repository};
use crate::store::{SqliteRecordStore, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DATABASE_FILE: &str = "DB_FILE";
pub const ENV_INDEX_FILE: &str = "INDEX_FILE";
pub const ENV_BUCKET_NAME: &str = "BUCKET_NAME";
pub const ENV_LOG_LEVEL: &str = "TAGSTORE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TAGSTORE_LOG_DIR";

/// Repository type produced by [`open_repository`].
pub type AppRepository = Repository<SqliteRecordStore, Box<dyn RelationshipIndex>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    /// Record store file. `None` means transient in-memory storage.
    pub database_file: Option<PathBuf>,
    /// Relationship index file. `None` means transient in-memory index.
    pub index_file: Option<PathBuf>,
    /// Remote backup bucket. Not supported by this build; logged and ignored.
    pub bucket_name: Option<String>,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
}

impl Configuration {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`; blank values count as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            database_file: read(ENV_DATABASE_FILE).map(PathBuf::from),
            index_file: read(ENV_INDEX_FILE).map(PathBuf::from),
            bucket_name: read(ENV_BUCKET_NAME),
            log_level: read(ENV_LOG_LEVEL),
            log_dir: read(ENV_LOG_DIR),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(db), Some(index)) = (&self.database_file, &self.index_file) {
            if db == index {
                return Err(ConfigError::SharedDatabaseFile(db.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    SharedDatabaseFile(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedDatabaseFile(path) => write!(
                f,
                "record store and relationship index cannot share `{}`",
                path.display()
            ),
        }
    }
}

impl Error for ConfigError {}

/// Startup failure; the process must not serve requests after one.
#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    Store(StoreError),
    Index(IndexError),
    Repo(RepoError),
}

impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
            Self::Store(err) => write!(f, "unable to open record store: {err}"),
            Self::Index(err) => write!(f, "unable to open relationship index: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Index(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

/// Opens store and index per `config` and rebuilds the index.
pub fn open_repository(config: &Configuration) -> Result<AppRepository, StartupError> {
    config.validate().map_err(StartupError::Config)?;

    if let Some(bucket) = config.bucket_name.as_deref() {
        warn!(
            "event=backup_config module=config status=skipped bucket={} reason=unsupported",
            bucket
        );
    }

    let store =
        SqliteRecordStore::open(config.database_file.as_deref()).map_err(StartupError::Store)?;
    let index = open_index(config.index_file.as_deref()).map_err(StartupError::Index)?;
    let repo = Repository::new(store, index).map_err(StartupError::Repo)?;

    info!(
        "event=repository_open module=config status=ok store_mode={} index_mode={}",
        mode(config.database_file.is_some()),
        mode(config.index_file.is_some())
    );
    Ok(repo)
}

fn mode(file_backed: bool) -> &'static str {
    if file_backed {
        "file"
    } else {
        "memory"
    }
}
