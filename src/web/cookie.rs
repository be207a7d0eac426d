//! Session identification by cookie.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderValue,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    response::Response,
};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "cryptapp_session";

/// The caller's session, read from the cookie or freshly minted.
#[derive(Debug, Clone, Copy)]
pub struct SessionId {
    pub id: Uuid,
    fresh: bool,
}

impl SessionId {
    fn from_headers(parts: &Parts) -> Option<Uuid> {
        parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| Uuid::parse_str(value).ok())
    }

    /// Add the `Set-Cookie` header when the session was just created.
    pub fn attach(&self, mut response: Response) -> Response {
        if self.fresh {
            let cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Strict",
                SESSION_COOKIE, self.id
            );
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        response
    }
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match Self::from_headers(parts) {
            Some(id) => Self { id, fresh: false },
            None => Self {
                id: Uuid::new_v4(),
                fresh: true,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use axum::response::IntoResponse;

    async fn extract(cookie: Option<&str>) -> SessionId {
        let mut builder = Request::builder().uri("/");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        SessionId::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_existing_cookie_is_reused() {
        let id = Uuid::new_v4();
        let session = extract(Some(&format!("theme=dark; {}={}", SESSION_COOKIE, id))).await;
        assert_eq!(session.id, id);
        let response = session.attach("ok".into_response());
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_missing_or_garbled_cookie_mints_session() {
        for cookie in [None, Some("cryptapp_session=not-a-uuid")] {
            let session = extract(cookie).await;
            let response = session.attach("ok".into_response());
            let set = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
            assert!(set.starts_with(&format!("{}={}", SESSION_COOKIE, session.id)));
            assert!(set.contains("HttpOnly"));
        }
    }
}
