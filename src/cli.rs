//! Command-line arguments (spec.md §6 "process startup").
//!
//! Grounded on the teacher's `shelter::main::Cli` — a single `clap::Parser`
//! struct with `#[command(version)]` and long flags with defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(clap::Parser)]
#[command(version, about = "Authoritative GSLB DNS server")]
pub struct Cli {
    /// Directory containing server.conf and zone.conf.
    #[arg(long = "etc", default_value = "/etc/gslb")]
    pub etc_dir: PathBuf,

    /// HTTP diagnostics listener address (spec.md §4.J).
    #[arg(long = "http", default_value = "127.0.0.1:8080")]
    pub http_server: SocketAddr,

    /// Seconds between config/zone mtime checks (spec.md §2 reload flow).
    #[arg(long = "reload-interval", default_value_t = 30)]
    pub reload_interval_s: u64,

    /// Seconds between cache sweeps (spec.md §5).
    #[arg(long = "sweep-interval", default_value_t = 60)]
    pub sweep_interval_s: u64,
}
