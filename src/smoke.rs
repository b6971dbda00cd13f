//! One-shot startup check that the front door answers end to end.

use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

/// Resource requested by the smoke test.
pub const SMOKE_KEY: &str = "albert/the/alligator.html";

#[derive(Debug, thiserror::Error)]
pub enum SmokeTestError {
    #[error("got an error in the get: {0}")]
    Get(#[source] reqwest::Error),
    #[error("got an error in the body read: {0}")]
    Body(#[source] reqwest::Error),
    #[error("got status {0} from the smoke test request")]
    Status(StatusCode),
}

/// Waits out `grace`, then issues a single GET against `addr` and reads the
/// body. Any failure means the service never became serviceable.
pub async fn run(addr: SocketAddr, grace: Duration, verbose: bool) -> Result<(), SmokeTestError> {
    tracing::info!("one-line smoke test starting");
    tokio::time::sleep(grace).await;

    let url = format!("http://{}/{SMOKE_KEY}", reachable(addr));
    let response = reqwest::get(&url).await.map_err(|e| {
        tracing::error!("\n{}", describe_request(&url));
        SmokeTestError::Get(e)
    })?;

    let status = response.status();
    let headers = response.headers().clone();
    let length = response.content_length();

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("\n{}", describe_response(&url, status, length, &headers, None));
            return Err(SmokeTestError::Body(e));
        }
    };

    let dump = || describe_response(&url, status, length, &headers, Some(&body));
    if !status.is_success() {
        tracing::error!("\n{}", dump());
        return Err(SmokeTestError::Status(status));
    }
    if verbose {
        tracing::info!("\n{}", dump());
    }

    tracing::info!("one-line smoke test complete");
    Ok(())
}

/// A wildcard bind address is not something a client can connect to.
fn reachable(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(Ipv6Addr::LOCALHOST.into(), addr.port()),
        _ => addr,
    }
}

fn describe_request(url: &str) -> String {
    format!("Request: \nGET {url} HTTP/1.1\n")
}

/// Human-readable dump of the smoke-test exchange.
fn describe_response(
    url: &str,
    status: StatusCode,
    length: Option<u64>,
    headers: &HeaderMap,
    body: Option<&str>,
) -> String {
    let mut s = describe_request(url);
    s.push_str("Response information:\n");
    match length {
        Some(len) => {
            let _ = writeln!(s, "    Length: {len}");
        }
        None => s.push_str("    Length: unknown\n"),
    }
    let _ = writeln!(s, "    Status code: {}", status.as_u16());
    s.push_str("Response contents: \n");
    for (name, value) in headers {
        let _ = writeln!(s, "{name}: {}", value.to_str().unwrap_or("<binary>"));
    }
    match body {
        Some(body) => {
            let _ = write!(s, "Body:\n {body}\n");
        }
        None => s.push_str("Body: <nil>\n"),
    }
    s
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{http::StatusCode as AxumStatus, Router};

    use super::*;
    use crate::config::{ServerModel, SimConfig};
    use crate::engine::Dispatcher;
    use crate::metrics::recorder::tests::SharedBuffer;
    use crate::metrics::LatencyLog;
    use crate::server::create_router;
    use crate::AppState;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    #[tokio::test]
    async fn passes_against_a_live_front_door() {
        let (latency_log, _writer) = LatencyLog::spawn(SharedBuffer::default());
        let config = SimConfig::new(1, Duration::from_millis(5), ServerModel::Finite);
        let state = Arc::new(AppState {
            dispatcher: Dispatcher::new(&config).0,
            latency_log,
        });
        let addr = serve(create_router(state)).await;

        run(addr, Duration::ZERO, true).await.expect("smoke test");
    }

    #[tokio::test]
    async fn nothing_listening_is_a_get_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let err = run(addr, Duration::ZERO, false).await.unwrap_err();
        assert!(matches!(err, SmokeTestError::Get(_)), "{err}");
    }

    #[tokio::test]
    async fn error_status_fails_the_check() {
        let app = Router::new().fallback(|| async { AxumStatus::SERVICE_UNAVAILABLE });
        let addr = serve(app).await;

        let err = run(addr, Duration::ZERO, false).await.unwrap_err();
        assert!(matches!(err, SmokeTestError::Status(s) if s.as_u16() == 503), "{err}");
    }

    #[test]
    fn wildcard_addresses_are_dialled_on_loopback() {
        let addr: SocketAddr = "0.0.0.0:5280".parse().expect("addr");
        assert_eq!(reachable(addr), "127.0.0.1:5280".parse::<SocketAddr>().expect("addr"));

        let addr: SocketAddr = "10.92.10.201:5280".parse().expect("addr");
        assert_eq!(reachable(addr), addr);
    }

    #[test]
    fn dump_mentions_status_length_and_body() {
        let dump = describe_response(
            "http://127.0.0.1:5280/x",
            StatusCode::OK,
            Some(9),
            &HeaderMap::new(),
            Some("success!\n"),
        );
        assert!(dump.contains("Status code: 200"));
        assert!(dump.contains("Length: 9"));
        assert!(dump.contains("success!"));
    }
}
