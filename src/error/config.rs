//! Errors produced while loading `server.conf` / `zone.conf` at startup.
//!
//! Per spec.md §7, `ConfigLoad` failures are fatal only on the initial load;
//! a reload failure after startup is logged and the previous snapshot is
//! retained (see `crate::state::ReloadTicker`).

#[derive(Debug)]
pub enum ConfigError {
    /// The config/zone file could not be opened or read.
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    /// A line in the file didn't match any recognized syntax.
    Syntax { path: std::path::PathBuf, line: usize, text: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "reading {}: {}", path.display(), source)
            }
            Self::Syntax { path, line, text } => write!(
                f,
                "{}:{}: unparseable line: {:?}",
                path.display(),
                line,
                text
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
