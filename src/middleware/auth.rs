use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

/// Raw value of the `Authorization` header with any `Bearer ` prefix
/// removed. Empty when the header is absent, so handlers decide which
/// "missing" error applies.
#[derive(Debug, Clone, PartialEq)]
pub struct BearerToken(pub String);

pub fn parse_authorization(header: &str) -> String {
    let header = header.trim();
    if header.eq_ignore_ascii_case("bearer") {
        return String::new();
    }
    match header.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim().to_string(),
        _ => header.to_string(),
    }
}

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .map(parse_authorization)
            .unwrap_or_default();

        async move { Ok(BearerToken(token)) }
    }
}
