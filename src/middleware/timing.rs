use axum::{extract::Request, middleware::Next, response::Response};
use tokio::time::Instant;

/// Adds two response headers measuring the full handler time, queuing included:
///
///   X-Response-Time-Us  — handler wall time in microseconds
///   Server-Timing       — same value in the standard Server-Timing format
///
/// Also emits one debug event per request.
pub async fn timing_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let us = elapsed.as_micros();

    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing = format!("queue+service;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    let status = response.status().as_u16();
    tracing::debug!(%method, %path, status, elapsed_us = us as u64, "request finished");

    response
}
