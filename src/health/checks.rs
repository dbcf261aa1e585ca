//! Probe dispatch table (spec.md §4.E). Grounded directly on
//! `original_source/checks.go`'s `dispatchServiceCheck` switch: one probe
//! function per known service name, all fail-closed on error.

use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the probe named by `service` against `target`. Unknown service
/// names fail closed and are logged, per spec.md §9's note that this
/// dispatch is a fixed enum rather than a registry.
pub async fn run(service: &str, target: &str) -> bool {
    match service {
        "check_true" => true,
        "check_false" => false,
        "check_http" => check_http(target).await,
        "check_mirror" => check_mirror(target).await,
        "check_irc" => check_tcp_connect(target, 6667).await,
        other => {
            log::warn!("unknown health check service {:?}, treating as down", other);
            false
        }
    }
}

async fn check_tcp_connect(host: &str, port: u16) -> bool {
    let addr = format!("{host}:{port}");
    matches!(
        tokio::time::timeout(TIMEOUT, tokio::net::TcpStream::connect(&addr)).await,
        Ok(Ok(_))
    )
}

async fn check_http(host: &str) -> bool {
    let Ok(client) = reqwest::Client::builder().timeout(TIMEOUT).build() else {
        return false;
    };
    match client.get(format!("http://{host}")).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

/// `check_mirror`: the response body must contain the literal substring
/// `master.test-ipv6.com`, with the request's Host header pinned to
/// `test-ipv6.com` (the Go source does this to probe a specific vhost).
async fn check_mirror(host: &str) -> bool {
    let Ok(client) = reqwest::Client::builder().timeout(TIMEOUT).build() else {
        return false;
    };
    let url = format!("http://{host}/site/config.js");
    let response = match client.get(&url).header("Host", "test-ipv6.com").send().await {
        Ok(r) => r,
        Err(_) => return false,
    };
    match response.text().await {
        Ok(body) => body.contains("master.test-ipv6.com"),
        Err(_) => false,
    }
}
