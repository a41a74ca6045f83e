use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common_http_errors::ApiError;
use uuid::Uuid;

/// Caller identity as delivered by the (out-of-scope) auth layer: an id and
/// a coarse role, carried on every request as headers. Absent headers mean
/// an anonymous customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Customer,
    Admin,
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Option<Uuid>,
    pub role: ActorRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

pub fn ensure_admin(actor: &Actor) -> Result<(), ApiError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ApiError::ForbiddenMissingRole { role: "admin", trace_id: None })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("X-Actor-ID")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok());
        let role = match parts.headers.get("X-Actor-Role").and_then(|v| v.to_str().ok()) {
            Some(value) if value.trim().eq_ignore_ascii_case("admin") => ActorRole::Admin,
            _ => ActorRole::Customer,
        };
        Ok(Actor { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn actor_for(req: Request<()>) -> Actor {
        let (mut parts, _) = req.into_parts();
        Actor::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn missing_headers_mean_anonymous_customer() {
        let actor = actor_for(Request::builder().body(()).unwrap()).await;
        assert!(actor.id.is_none());
        assert_eq!(actor.role, ActorRole::Customer);
        assert!(ensure_admin(&actor).is_err());
    }

    #[tokio::test]
    async fn admin_role_header_is_honoured() {
        let id = Uuid::new_v4();
        let req = Request::builder()
            .header("X-Actor-ID", id.to_string())
            .header("X-Actor-Role", "admin")
            .body(())
            .unwrap();
        let actor = actor_for(req).await;
        assert_eq!(actor.id, Some(id));
        assert!(actor.is_admin());
        assert!(ensure_admin(&actor).is_ok());
    }
}
