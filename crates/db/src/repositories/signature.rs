use chrono::{DateTime, Utc};
use sqlx::Row;

use approflow_core::domain::demande::DemandeId;
use approflow_core::domain::signature::{SignatureId, ValidationSignature, ValidationStep};
use approflow_core::domain::user::UserId;

use super::{RepositoryError, SignatureRepository};
use crate::DbPool;

pub struct SqlSignatureRepository {
    pool: DbPool,
}

impl SqlSignatureRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_signature(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ValidationSignature, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let demande_id: String =
        row.try_get("demande_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let step_str: String =
        row.try_get("step").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let action: String =
        row.try_get("action").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let comment: Option<String> =
        row.try_get("comment").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stamp: String = row.try_get("stamp").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let step = ValidationStep::parse(&step_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown validation step `{step_str}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;

    Ok(ValidationSignature {
        id: SignatureId(id),
        demande_id: DemandeId(demande_id),
        user_id: UserId(user_id),
        step,
        action,
        comment,
        stamp,
        created_at,
    })
}

#[async_trait::async_trait]
impl SignatureRepository for SqlSignatureRepository {
    async fn find_by_demande_id(
        &self,
        demande_id: &DemandeId,
    ) -> Result<Vec<ValidationSignature>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, demande_id, user_id, step, action, comment, stamp, created_at
             FROM validation_signature WHERE demande_id = ? ORDER BY created_at ASC",
        )
        .bind(&demande_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_signature).collect::<Result<Vec<_>, _>>()
    }
}
