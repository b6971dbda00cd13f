use axum::{middleware as axum_mw, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::timing;
use crate::AppState;

/// Builds the Axum `Router`: every path and method lands on the simulator.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handlers::simulate::simulate)
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use super::*;
    use crate::config::{ServerModel, SimConfig};
    use crate::engine::Dispatcher;
    use crate::handlers::simulate::SUCCESS_BODY;
    use crate::metrics::recorder::tests::SharedBuffer;
    use crate::metrics::LatencyLog;

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, String, bool) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let timed = response.headers().contains_key("X-Response-Time-Us");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8(body.to_vec()).expect("utf8"), timed)
    }

    #[tokio::test]
    async fn any_path_is_served_and_logged() {
        let buffer = SharedBuffer::default();
        let (latency_log, writer) = LatencyLog::spawn(buffer.clone());
        let config = SimConfig::new(1, Duration::from_millis(10), ServerModel::Finite);
        let (dispatcher, pool) = Dispatcher::new(&config);
        let state = Arc::new(AppState {
            dispatcher,
            latency_log,
        });
        let app = create_router(state.clone());

        let (status, body, timed) = send(app.clone(), "GET", "/albert/the/alligator.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, SUCCESS_BODY);
        assert!(timed);

        let (status, _, _) = send(app.clone(), "POST", "/some/other/thing").await;
        assert_eq!(status, StatusCode::OK);

        // A router clone that outlives the server, as a connection task can.
        let lingering = app.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(lingering);
        });
        drop(app);
        drop(state);
        pool.join().await;
        assert_eq!(writer.drain().await.expect("drain"), 2);

        let contents = buffer.contents();
        let lines: Vec<_> = contents.lines().collect();
        assert!(lines[1].ends_with(" albert/the/alligator.html 200 GET"), "{}", lines[1]);
        assert!(lines[2].ends_with(" some/other/thing 200 GET"), "{}", lines[2]);

        let latency: f64 = lines[1]
            .split_whitespace()
            .nth(2)
            .and_then(|v| v.parse().ok())
            .expect("latency column");
        assert!(latency >= 0.010, "latency {latency} below service time");
    }

    #[tokio::test]
    async fn closed_pool_answers_500_with_the_error_text() {
        let (latency_log, _writer) = LatencyLog::spawn(SharedBuffer::default());
        let state = Arc::new(AppState {
            dispatcher: Dispatcher::closed(Duration::from_millis(1)),
            latency_log,
        });

        let (status, body, _) = send(create_router(state), "GET", "/x").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "service centers have shut down");
    }

    #[tokio::test(start_paused = true)]
    async fn infinite_model_serves_concurrent_requests_without_queuing() {
        let buffer = SharedBuffer::default();
        let (latency_log, writer) = LatencyLog::spawn(buffer.clone());
        let config = SimConfig::new(1, Duration::from_millis(100), ServerModel::Infinite);
        let (dispatcher, pool) = Dispatcher::new(&config);
        let state = Arc::new(AppState {
            dispatcher,
            latency_log,
        });
        let app = create_router(state.clone());
        let started = tokio::time::Instant::now();

        let requests: Vec<_> = (0..5)
            .map(|i| {
                let app = app.clone();
                tokio::spawn(async move { send(app, "GET", &format!("/k{i}")).await })
            })
            .collect();
        for request in requests {
            let (status, body, _) = request.await.expect("join");
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, SUCCESS_BODY);
        }
        assert_eq!(started.elapsed(), Duration::from_millis(100));

        drop(app);
        drop(state);
        pool.join().await;
        assert_eq!(writer.drain().await.expect("drain"), 5);
        for line in buffer.contents().lines().skip(1) {
            assert!(line.contains(" 0.100000 "), "{line}");
        }
    }
}
