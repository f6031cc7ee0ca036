use chrono::Utc;
use sqlx::Row;

use approflow_core::domain::user::{Role, User, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_admin: i64 =
        row.try_get("is_admin").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let role = Role::parse(&role_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role_str}`")))?;

    Ok(User { id: UserId(id), name, role, is_admin: is_admin != 0 })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, role, is_admin FROM app_user WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_api_token(&self, api_token: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, role, is_admin FROM app_user WHERE api_token = ?")
            .bind(api_token)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, user: User, api_token: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user (id, name, role, api_token, is_admin, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 role = excluded.role,
                 api_token = excluded.api_token,
                 is_admin = excluded.is_admin",
        )
        .bind(&user.id.0)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(api_token)
        .bind(i64::from(user.is_admin))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approflow_core::domain::user::{Role, User, UserId};

    use super::SqlUserRepository;
    use crate::repositories::UserRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_user(id: &str, role: Role) -> User {
        User { id: UserId(id.to_string()), name: format!("user {id}"), role, is_admin: false }
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-1", Role::ConducteurTravaux), "tok-1").await.expect("save");

        let found = repo.find_by_id(&UserId("u-1".to_string())).await.expect("find");
        let found = found.expect("should exist");
        assert_eq!(found.role, Role::ConducteurTravaux);
        assert!(!found.is_admin);
    }

    #[tokio::test]
    async fn find_by_api_token_resolves_caller_identity() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-appro", Role::ResponsableAppro), "tok-appro")
            .await
            .expect("save");

        let found = repo.find_by_api_token("tok-appro").await.expect("find");
        assert_eq!(found.expect("should exist").id.0, "u-appro");

        let missing = repo.find_by_api_token("tok-unknown").await.expect("find");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn save_upserts_role_changes() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-1", Role::Employe), "tok-1").await.expect("save");
        let mut promoted = sample_user("u-1", Role::ChargeAffaire);
        promoted.is_admin = true;
        repo.save(promoted, "tok-1").await.expect("upsert");

        let found = repo.find_by_id(&UserId("u-1".to_string())).await.expect("find");
        let found = found.expect("should exist");
        assert_eq!(found.role, Role::ChargeAffaire);
        assert!(found.is_admin);
    }
}
