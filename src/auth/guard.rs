use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::tokens::{self, Scope, TokenError, TokenStore};
use crate::{error::AppError, state::AppState, users::model::User, users::repo::UserStore};

/// Resources that belong to the user who created them.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

/// Pulls the token out of `Bearer <token>`.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AppError> {
    let header = header.ok_or(AppError::MalformedHeader)?;
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(AppError::MalformedHeader),
    }
}

/// Resolves the acting user from an `Authorization` header value.
pub async fn authenticate(
    users: &dyn UserStore,
    token_store: &dyn TokenStore,
    header: Option<&str>,
) -> Result<User, AppError> {
    let token = parse_bearer(header)?;
    let user_id = match tokens::verify(token_store, token, Scope::Authentication).await {
        Ok(id) => id,
        Err(TokenError::Store(e)) => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "authentication token rejected");
            return Err(AppError::Unauthorized);
        }
    };
    let user = users.get(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "token belongs to a missing user");
        AppError::Unauthorized
    })?;
    debug!(%user_id, "request authenticated");
    Ok(user)
}

/// Call after the resource has been fetched, so a missing one is reported as `NotFound`.
pub fn require_ownership<R: Owned + ?Sized>(resource: &R, user_id: Uuid) -> Result<(), AppError> {
    if resource.owner_id() == user_id {
        Ok(())
    } else {
        warn!(%user_id, owner_id = %resource.owner_id(), "mutation by non-owner refused");
        Err(AppError::Forbidden(
            "you must be the owner of this resource to modify it",
        ))
    }
}

pub fn require_activated(user: &User) -> Result<(), AppError> {
    if user.activated {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "your user account must be activated to access this resource",
        ))
    }
}

/// The authenticated user for this request.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|h| h.to_str().map_err(|_| AppError::MalformedHeader))
            .transpose()?;
        let user = authenticate(state.users.as_ref(), state.tokens.as_ref(), header).await?;
        Ok(AuthUser(user))
    }
}

/// An authenticated user whose account has been activated.
pub struct ActivatedUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for ActivatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        require_activated(&user)?;
        Ok(ActivatedUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryTokens, MemoryUsers};

    struct Doc(Uuid);

    impl Owned for Doc {
        fn owner_id(&self) -> Uuid {
            self.0
        }
    }

    #[test]
    fn bearer_parsing() {
        let token = "A".repeat(tokens::TOKEN_LEN);
        let header = format!("Bearer {token}");
        assert_eq!(parse_bearer(Some(&header)).unwrap(), token);

        for bad in [
            None,
            Some(""),
            Some("Bearer"),
            Some("Bearer "),
            Some("Basic abc"),
            Some("bearer abc"),
            Some("Bearer a b"),
        ] {
            assert!(
                matches!(parse_bearer(bad), Err(AppError::MalformedHeader)),
                "{bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn authenticate_resolves_user_from_session_token() {
        let users = MemoryUsers::default();
        let store = MemoryTokens::default();
        let user = users.seed("alice@example.com", true).await;
        let token = tokens::issue(&store, user.id, time::Duration::hours(1), Scope::Authentication)
            .await
            .unwrap();

        let header = format!("Bearer {}", token.plaintext);
        let acting = authenticate(&users, &store, Some(&header)).await.unwrap();
        assert_eq!(acting.id, user.id);
    }

    #[tokio::test]
    async fn authenticate_rejects_activation_tokens() {
        let users = MemoryUsers::default();
        let store = MemoryTokens::default();
        let user = users.seed("alice@example.com", false).await;
        let token = tokens::issue(&store, user.id, time::Duration::hours(1), Scope::Activation)
            .await
            .unwrap();

        let header = format!("Bearer {}", token.plaintext);
        assert!(matches!(
            authenticate(&users, &store, Some(&header)).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn authenticate_rejects_unknown_malformed_and_expired() {
        let users = MemoryUsers::default();
        let store = MemoryTokens::default();
        let user = users.seed("alice@example.com", true).await;
        let expired = tokens::issue(&store, user.id, time::Duration::seconds(-1), Scope::Authentication)
            .await
            .unwrap();

        for header in [
            format!("Bearer {}", "C".repeat(tokens::TOKEN_LEN)),
            "Bearer tooshort".to_string(),
            format!("Bearer {}", expired.plaintext),
        ] {
            assert!(matches!(
                authenticate(&users, &store, Some(&header)).await,
                Err(AppError::Unauthorized)
            ));
        }
        assert!(matches!(
            authenticate(&users, &store, None).await,
            Err(AppError::MalformedHeader)
        ));
    }

    #[tokio::test]
    async fn authenticate_rejects_token_of_deleted_user() {
        let users = MemoryUsers::default();
        let store = MemoryTokens::default();
        let ghost = Uuid::new_v4();
        let token = tokens::issue(&store, ghost, time::Duration::hours(1), Scope::Authentication)
            .await
            .unwrap();
        let header = format!("Bearer {}", token.plaintext);
        assert!(matches!(
            authenticate(&users, &store, Some(&header)).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn ownership_is_owner_only() {
        let owner = Uuid::new_v4();
        let doc = Doc(owner);
        assert!(require_ownership(&doc, owner).is_ok());
        assert!(matches!(
            require_ownership(&doc, Uuid::new_v4()),
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn activation_gate() {
        let users = MemoryUsers::default();
        let inactive = users.seed("a@example.com", false).await;
        let active = users.seed("b@example.com", true).await;
        assert!(matches!(
            require_activated(&inactive),
            Err(AppError::Forbidden(_))
        ));
        assert!(require_activated(&active).is_ok());
    }
}
