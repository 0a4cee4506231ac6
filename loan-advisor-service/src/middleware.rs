use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "loan_advisor_session";

/// Opaque per-browser session identifier, placed in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

/// Reads the session id from the `Cookie` headers, ignoring values that are
/// not ids this service could have issued.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| Uuid::parse_str(value).is_ok())
        .map(str::to_string)
}

fn session_cookie(session_id: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session_id
    )
}

/// Resolves (or issues) the caller's session id and tags the request span
/// with it and a fresh correlation id.
pub async fn session_middleware(mut request: Request<Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    let (session_id, issued) = match session_id_from_headers(request.headers()) {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }
    request
        .extensions_mut()
        .insert(SessionId(session_id.clone()));

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        session_id = %session_id
    );

    let mut response = next.run(request).instrument(span).await;

    if issued {
        match HeaderValue::from_str(&session_cookie(&session_id)) {
            Ok(cookie) => {
                debug!(session_id = %session_id, "Issued new session cookie");
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(e) => warn!(error = %e, "Could not encode session cookie"),
        }
    }

    response
}
