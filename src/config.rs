use std::path::PathBuf;

pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;

/// Process configuration, read from `WORQPLACE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Journal directory. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub metrics_port: Option<u16>,
    /// Journal appends after which the binary compacts on startup.
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            metrics_port: None,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            data_dir: lookup("WORQPLACE_DATA_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            metrics_port: lookup("WORQPLACE_METRICS_PORT").and_then(|s| s.parse().ok()),
            compact_threshold: lookup("WORQPLACE_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_COMPACT_THRESHOLD),
        }
    }

    pub fn journal_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("worqplace.journal"))
    }
}
