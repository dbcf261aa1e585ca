//! Process entry point (spec.md §6 "process startup and signals").
//!
//! Grounded on the teacher's `shelter::main`: `env_logger::init_from_env`,
//! `clap::Parser::parse`, an `actix_web::main` runtime. Startup fails fatally
//! (spec.md §7 `ConfigLoad`) if `server.conf` is missing either listener
//! address family, or if any listener fails to bind.

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use env_logger::Env;

use gslbd::cli::Cli;
use gslbd::diagnostics;
use gslbd::dns::handler;
use gslbd::error::{GslbError, Result};
use gslbd::state::{run_reload_ticker, run_sweep_ticker, GlobalState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        log::error!("fatal startup error: {}", err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let state = GlobalState::new(&cli.etc_dir).await?;

    let (udp_addrs, tcp_addrs) = {
        let snapshot = state.snapshot.load();
        let udp = listen_addrs(&snapshot.config, "udp")?;
        let tcp = listen_addrs(&snapshot.config, "tcp")?;
        (udp, tcp)
    };

    for addr in udp_addrs {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(err) = handler::serve_udp(state, addr).await {
                log::error!("UDP listener on {addr} failed: {}", err);
            }
        });
    }
    for addr in tcp_addrs {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(err) = handler::serve_tcp(state, addr).await {
                log::error!("TCP listener on {addr} failed: {}", err);
            }
        });
    }

    tokio::spawn(run_reload_ticker(Arc::clone(&state), cli.etc_dir.clone(), cli.reload_interval_s));
    tokio::spawn(run_sweep_ticker(Arc::clone(&state), cli.sweep_interval_s));

    log::info!("GSLB diagnostics HTTP listening on {}", cli.http_server);
    let http_state = Arc::clone(&state);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&http_state)))
            .configure(diagnostics::configure)
    })
    .bind(cli.http_server)
    .map_err(GslbError::Bind)?
    .run()
    .await
    .map_err(GslbError::Io)?;

    Ok(())
}

/// Reads `[server] udp`/`tcp` as a list of `host:port` addresses. Per
/// spec.md §6, the absence of either key is a startup-fatal error.
fn listen_addrs(config: &gslbd::config::Config, name: &str) -> Result<Vec<SocketAddr>> {
    let raw = config.get_strings("server", name).ok_or_else(|| {
        GslbError::Config(gslbd::error::config::ConfigError::Io {
            path: format!("server.conf: missing [server] {name}").into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing listener addresses"),
        })
    })?;
    raw.iter()
        .map(|addr| {
            addr.parse::<SocketAddr>().map_err(|_| {
                GslbError::Config(gslbd::error::config::ConfigError::Syntax {
                    path: "server.conf".into(),
                    line: 0,
                    text: addr.clone(),
                })
            })
        })
        .collect()
}
