use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, RawPathParams, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use clinic_auth::{BindingMeta, Right};
use clinic_infra::Credentials;

use crate::app::errors::auth_error_to_response;
use crate::app::services::AppServices;
use crate::context::RequestContext;
use crate::cookies::{ACCESS_COOKIE, REFRESH_COOKIE, append_session_cookies, parse_cookie};

/// Per-route gate configuration: the shared services plus the rights the
/// route demands. An empty list means "any authenticated caller".
#[derive(Clone)]
pub struct GateState {
    pub services: Arc<AppServices>,
    pub required: Arc<[Right]>,
}

impl GateState {
    pub fn new(services: Arc<AppServices>, required: impl IntoIterator<Item = Right>) -> Self {
        Self {
            services,
            required: required.into_iter().collect(),
        }
    }
}

/// Binding metadata from the caller's address: first `x-forwarded-for` hop,
/// else the socket peer.
pub fn client_binding(headers: &HeaderMap, peer: Option<SocketAddr>) -> BindingMeta {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => BindingMeta::from_ip(ip),
        (None, Some(addr)) => BindingMeta::from_ip(addr.ip().to_string()),
        (None, None) => BindingMeta::default(),
    }
}

/// Cookie-based auth gate.
///
/// Authenticates from the `access`/`refresh` cookies, rotating the session
/// when needed, then applies the role policy with the path's `id` parameter
/// as the owned resource. Rotated cookies are returned on every outcome
/// after authentication, including a policy rejection, because the old
/// refresh token is already spent.
pub async fn auth_middleware(
    State(state): State<GateState>,
    path: Option<RawPathParams>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let headers = req.headers();
    let credentials = Credentials::new(
        parse_cookie(headers, ACCESS_COOKIE),
        parse_cookie(headers, REFRESH_COOKIE),
    );
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let binding = client_binding(headers, peer);

    let services = &state.services;
    let authenticated = match services
        .gate
        .authenticate(&credentials, &binding, Utc::now())
        .await
    {
        Ok(authenticated) => authenticated,
        Err(e) => return auth_error_to_response(e),
    };

    let target = path.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(key, _)| *key == "id")
            .map(|(_, value)| value.to_string())
    });

    let response = match services.gate.authorize(
        &authenticated.identity,
        &state.required,
        target.as_deref(),
    ) {
        Ok(()) => {
            req.extensions_mut()
                .insert(RequestContext::new(authenticated.identity));
            next.run(req).await
        }
        Err(e) => auth_error_to_response(e),
    };

    let mut response = response;
    if let Some(tokens) = &authenticated.rotated {
        append_session_cookies(response.headers_mut(), tokens, services.cookie_secure());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(client_binding(&headers, Some(peer)).ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(
            client_binding(&HeaderMap::new(), Some(peer)).ip.as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(client_binding(&HeaderMap::new(), None), BindingMeta::default());
    }
}
