//! Bearer-token resolution of the calling user.
//!
//! Tokens are opaque per-user API tokens. A missing, malformed, or
//! unknown token is always `Unauthenticated`; the caller learns nothing
//! about which part of the credential was wrong.

use axum::http::{header, HeaderMap};

use approflow_core::domain::user::User;
use approflow_core::errors::WorkflowError;
use approflow_db::{SqlUserRepository, UserRepository};

pub async fn authenticate(
    users: &SqlUserRepository,
    headers: &HeaderMap,
) -> Result<User, WorkflowError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        return Err(WorkflowError::Unauthenticated);
    };

    match users.find_by_api_token(token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(WorkflowError::Unauthenticated),
        Err(error) => Err(WorkflowError::Internal(error.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header, HeaderMap, HeaderValue};

    use approflow_core::domain::user::{Role, User, UserId};
    use approflow_core::errors::WorkflowError;
    use approflow_db::{connect_with_settings, migrations, SqlUserRepository, UserRepository};

    use super::authenticate;

    async fn setup() -> SqlUserRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlUserRepository::new(pool);
        repo.save(
            User {
                id: UserId("u-1".to_string()),
                name: "Conducteur".to_string(),
                role: Role::ConducteurTravaux,
                is_admin: false,
            },
            "tok-conducteur",
        )
        .await
        .expect("seed user");
        repo
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[tokio::test]
    async fn valid_bearer_token_resolves_the_user() {
        let repo = setup().await;
        let user = authenticate(&repo, &headers_with("Bearer tok-conducteur"))
            .await
            .expect("token should resolve");
        assert_eq!(user.id.0, "u-1");
        assert_eq!(user.role, Role::ConducteurTravaux);
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let repo = setup().await;
        let error = authenticate(&repo, &HeaderMap::new()).await.expect_err("no header");
        assert_eq!(error, WorkflowError::Unauthenticated);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthenticated() {
        let repo = setup().await;
        let error = authenticate(&repo, &headers_with("Bearer tok-unknown"))
            .await
            .expect_err("unknown token");
        assert_eq!(error, WorkflowError::Unauthenticated);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_unauthenticated() {
        let repo = setup().await;
        let error = authenticate(&repo, &headers_with("Basic dXNlcjpwYXNz"))
            .await
            .expect_err("wrong scheme");
        assert_eq!(error, WorkflowError::Unauthenticated);
    }
}
