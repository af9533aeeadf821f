use crate::pipeline::{BatchLogger, RequestContext};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request context middleware
///
/// Binds a [`RequestLogger`](crate::pipeline::RequestLogger) to every request
/// as an extension, logs the finished exchange at the `http` derived level and
/// echoes the request id.
pub async fn request_context_middleware(
    State(logger): State<BatchLogger>,
    mut req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let context = extract_context(&req);
    let request_id = context.request_id;

    let request_logger = logger.for_request(context);
    req.extensions_mut().insert(request_logger.clone());

    let mut response = next.run(req).await;

    request_logger.http(
        response.status().as_u16(),
        start.elapsed().as_millis() as u64,
        None,
    );

    if let Some(id) = request_id {
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
    }

    response
}

fn extract_context(req: &Request) -> RequestContext {
    let headers = req.headers();

    // Keep a caller-supplied id only if it is a UUID
    let request_id = header(headers, REQUEST_ID_HEADER)
        .and_then(|v| Uuid::try_parse(v).ok())
        .unwrap_or_else(Uuid::new_v4);

    RequestContext {
        request_id: Some(request_id),
        user_id: header(headers, "x-user-id").map(str::to_string),
        session_id: header(headers, "x-session-id").map(str::to_string),
        ip: client_ip(headers),
        user_agent: header(headers, "user-agent").map(str::to_string),
        method: Some(req.method().to_string()),
        url: Some(req.uri().to_string()),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// First hop of `x-forwarded-for`, else `x-real-ip`
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header(headers, "x-real-ip"))
        .map(str::to_string)
}
