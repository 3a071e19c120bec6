//! Facts about the caller that every gate and the audit logger need.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, Method, Uri, header, request::Parts};

/// Who is on the other end of the request, which decides the response shape
/// of a rejection: JSON for machines, redirects and pages for browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerKind {
    Machine,
    Browser,
}

impl CallerKind {
    /// JSON or XHR callers are machines and explicit HTML callers are
    /// browsers. Without either hint the `/api/` prefix decides.
    pub fn detect(headers: &HeaderMap, path: &str) -> Self {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let accepts_json = accept.contains("json");
        let accepts_html = accept.contains("text/html");
        let is_xhr = headers
            .get("x-requested-with")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));

        if accepts_json || is_xhr {
            CallerKind::Machine
        } else if accepts_html || !path.starts_with("/api/") {
            CallerKind::Browser
        } else {
            CallerKind::Machine
        }
    }

    pub fn is_browser(self) -> bool {
        self == CallerKind::Browser
    }
}

/// Request facts captured once and passed to the gates, the audit logger and
/// the error reporter.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub url: String,
    pub path: String,
    pub ip: String,
    pub user_agent: String,
    pub caller: CallerKind,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        Self::capture(&parts.method, &parts.uri, &parts.headers, &parts.extensions)
    }

    pub fn capture(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        extensions: &axum::http::Extensions,
    ) -> Self {
        let path = uri.path().to_string();
        Self {
            method: method.clone(),
            url: full_url(uri, headers),
            caller: CallerKind::detect(headers, &path),
            path,
            ip: client_ip(headers, extensions),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string(),
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

fn full_url(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    match headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
        Some(host) => format!("http://{}{}", host, path_and_query),
        None => path_and_query.to_string(),
    }
}

/// First `X-Forwarded-For` hop, else the socket peer address.
fn client_ip(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    #[test]
    fn test_api_paths_are_machine_callers() {
        let headers = HeaderMap::new();
        assert_eq!(
            CallerKind::detect(&headers, "/api/customers"),
            CallerKind::Machine
        );
        assert_eq!(CallerKind::detect(&headers, "/customers"), CallerKind::Browser);
    }

    #[test]
    fn test_json_accept_and_xhr_are_machine_callers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert_eq!(CallerKind::detect(&headers, "/login"), CallerKind::Machine);

        let mut headers = HeaderMap::new();
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        assert_eq!(CallerKind::detect(&headers, "/login"), CallerKind::Machine);
    }

    #[test]
    fn test_html_accept_is_browser_even_under_api() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        assert_eq!(
            CallerKind::detect(&headers, "/api/customers"),
            CallerKind::Browser
        );
    }

    #[test]
    fn test_forwarded_for_wins_over_peer() {
        let request = Request::builder()
            .uri("/api/customers?page=2")
            .header(header::HOST, "opsdesk.test")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        let context = RequestContext::from_parts(&parts);

        assert_eq!(context.ip, "203.0.113.7");
        assert_eq!(context.url, "http://opsdesk.test/api/customers?page=2");
        assert_eq!(context.user_agent, "unknown");
    }

    #[test]
    fn test_peer_address_fallback() {
        let request = Request::builder()
            .uri("/health")
            .extension(ConnectInfo(SocketAddr::from(([192, 168, 1, 5], 4000))))
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(RequestContext::from_parts(&parts).ip, "192.168.1.5");
    }
}
