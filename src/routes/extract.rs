use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the user id verified by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity as forwarded by the gateway. Absent or blank means unauthenticated.
#[derive(Debug, Clone, Default)]
pub struct Requester(pub Option<String>);

impl Requester {
    /// Verified user id, if any.
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        Ok(Self(id))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Requester {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Requester::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn blank_or_missing_header_is_anonymous() {
        assert_eq!(extract(None).await.id(), None);
        assert_eq!(extract(Some("   ")).await.id(), None);
        assert_eq!(extract(Some(" ana ")).await.id(), Some("ana"));
    }
}
