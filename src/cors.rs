//! Cross-origin policy.
//!
//! Builds a `tower_http` [`CorsLayer`] from [`CorsConfig`]. Methods and request
//! headers are always unrestricted. Browsers refuse a literal `*` on
//! credentialed requests, so when credentials are allowed every wildcard is
//! mirrored from the request instead of sent verbatim.

use axum::http::{header, HeaderName, HeaderValue};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};

use crate::config::CorsConfig;
use crate::middleware::REQUEST_ID_HEADER;

/// Headers exposed when `expose_headers = ["*"]` is combined with credentials.
fn emitted_headers() -> Vec<HeaderName> {
    vec![
        header::CONTENT_TYPE,
        header::CONTENT_LENGTH,
        HeaderName::from_static(REQUEST_ID_HEADER),
    ]
}

/// Build the CORS layer. A disabled policy or an empty origin list yields a
/// layer that never emits `access-control-allow-origin`.
pub fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    if !cors.enabled {
        return CorsLayer::new();
    }

    let (any_origin, origins) = parse_allowed_origins(&cors.allowed_origins);
    if !any_origin && origins.is_empty() {
        tracing::warn!("CORS enabled but allowed_origins is empty, no origins will be allowed");
        return CorsLayer::new();
    }
    let (any_expose, expose) = parse_expose_headers(&cors.expose_headers);

    let mut layer = CorsLayer::new();

    layer = match (any_origin, cors.allow_credentials) {
        (true, true) => layer.allow_origin(AllowOrigin::mirror_request()),
        (true, false) => layer.allow_origin(Any),
        (false, _) => layer.allow_origin(origins),
    };

    if cors.allow_credentials {
        layer = layer
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true);
    } else {
        layer = layer.allow_methods(Any).allow_headers(Any);
    }

    layer = match (any_expose, cors.allow_credentials) {
        (true, true) => layer.expose_headers(emitted_headers()),
        (true, false) => layer.expose_headers(ExposeHeaders::any()),
        (false, _) if !expose.is_empty() => layer.expose_headers(expose),
        (false, _) => layer,
    };

    layer
}

fn parse_allowed_origins(values: &[String]) -> (bool, Vec<HeaderValue>) {
    let mut any = false;
    let mut origins = Vec::new();
    for raw in values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        if value == "*" {
            any = true;
            continue;
        }
        match HeaderValue::from_str(value) {
            Ok(v) => origins.push(v),
            Err(_) => tracing::warn!(value, "Ignoring invalid CORS origin"),
        }
    }
    (any, origins)
}

fn parse_expose_headers(values: &[String]) -> (bool, Vec<HeaderName>) {
    let mut any = false;
    let mut headers = Vec::new();
    for raw in values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        if value == "*" {
            any = true;
            continue;
        }
        match HeaderName::from_bytes(value.to_ascii_lowercase().as_bytes()) {
            Ok(h) => headers.push(h),
            Err(_) => tracing::warn!(value, "Ignoring invalid CORS expose header"),
        }
    }
    (any, headers)
}
