use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use approflow_core::domain::demande::{
    format_numero, Demande, DemandeId, DemandeStatus, DemandeType, ItemDemande, ItemDemandeId,
};
use approflow_core::domain::user::UserId;

use super::{DemandeRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDemandeRepository {
    pool: DbPool,
}

impl SqlDemandeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Allocate the next human-readable numero for the current year. Runs
    /// inside the caller's connection so creation stays one transaction.
    pub async fn next_numero(&self) -> Result<String, RepositoryError> {
        let year = Utc::now().year();
        let prefix = format!("DEM-{year}-%");
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM demande WHERE numero LIKE ?")
                .bind(&prefix)
                .fetch_one(&self.pool)
                .await?;
        let sequence = u32::try_from(count).unwrap_or(u32::MAX).saturating_add(1);
        Ok(format_numero(year, sequence))
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|e| RepositoryError::Decode(format!("{field}: invalid decimal `{value}`: {e}")))
}

fn parse_datetime(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{field}: {e}")))
}

pub(crate) fn row_to_demande_head(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Demande, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let numero: String =
        row.try_get("numero").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let type_str: String =
        row.try_get("demande_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_by: String =
        row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let project_id: String =
        row.try_get("project_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let demande_type = DemandeType::parse(&type_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown demande type `{type_str}`")))?;
    let status = DemandeStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status_str}`")))?;

    Ok(Demande {
        id: DemandeId(id),
        numero,
        demande_type,
        status,
        created_by: UserId(created_by),
        project_id,
        items: Vec::new(),
        created_at: parse_datetime("created_at", &created_at_str)?,
        updated_at: parse_datetime("updated_at", &updated_at_str)?,
    })
}

pub(crate) fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<ItemDemande, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let demande_id: String =
        row.try_get("demande_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let designation: String =
        row.try_get("designation").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantite_demandee_str: String =
        row.try_get("quantite_demandee").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantite_sortie_str: Option<String> =
        row.try_get("quantite_sortie").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_sortie_str: Option<String> =
        row.try_get("date_sortie").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let quantite_demandee = parse_decimal("quantite_demandee", &quantite_demandee_str)?;
    let quantite_sortie = quantite_sortie_str
        .map(|value| parse_decimal("quantite_sortie", &value))
        .transpose()?;
    let date_sortie =
        date_sortie_str.map(|value| parse_datetime("date_sortie", &value)).transpose()?;

    Ok(ItemDemande {
        id: ItemDemandeId(id),
        demande_id: DemandeId(demande_id),
        designation,
        quantite_demandee,
        quantite_sortie,
        date_sortie,
    })
}

#[async_trait::async_trait]
impl DemandeRepository for SqlDemandeRepository {
    async fn find_by_id(&self, id: &DemandeId) -> Result<Option<Demande>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, numero, demande_type, status, created_by, project_id,
                    created_at, updated_at
             FROM demande WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(ref row) = row else {
            return Ok(None);
        };
        let mut demande = row_to_demande_head(row)?;

        let item_rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, demande_id, designation, quantite_demandee, quantite_sortie, date_sortie
             FROM item_demande WHERE demande_id = ? ORDER BY position ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        demande.items = item_rows.iter().map(row_to_item).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(demande))
    }

    async fn create(&self, demande: Demande) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO demande (id, numero, demande_type, status, created_by, project_id,
                                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&demande.id.0)
        .bind(&demande.numero)
        .bind(demande.demande_type.as_str())
        .bind(demande.status.as_str())
        .bind(&demande.created_by.0)
        .bind(&demande.project_id)
        .bind(demande.created_at.to_rfc3339())
        .bind(demande.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, item) in demande.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO item_demande (id, demande_id, designation, quantite_demandee,
                                           quantite_sortie, date_sortie, position)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id.0)
            .bind(&demande.id.0)
            .bind(&item.designation)
            .bind(item.quantite_demandee.to_string())
            .bind(item.quantite_sortie.map(|q| q.to_string()))
            .bind(item.date_sortie.map(|dt| dt.to_rfc3339()))
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use approflow_core::domain::demande::{
        Demande, DemandeId, DemandeStatus, DemandeType, ItemDemande, ItemDemandeId,
    };
    use approflow_core::domain::user::{Role, User, UserId};

    use super::SqlDemandeRepository;
    use crate::repositories::{DemandeRepository, SqlUserRepository, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_creator(pool: &sqlx::SqlitePool, user_id: &str) {
        let repo = SqlUserRepository::new(pool.clone());
        let user = User {
            id: UserId(user_id.to_string()),
            name: "Employe".to_string(),
            role: Role::Employe,
            is_admin: false,
        };
        repo.save(user, &format!("tok-{user_id}")).await.expect("insert creator");
    }

    fn sample_demande(id: &str, numero: &str) -> Demande {
        let now = Utc::now();
        Demande {
            id: DemandeId(id.to_string()),
            numero: numero.to_string(),
            demande_type: DemandeType::Materiel,
            status: DemandeStatus::initial_for(DemandeType::Materiel),
            created_by: UserId("u-employe".to_string()),
            project_id: "chantier-nord".to_string(),
            items: vec![
                ItemDemande {
                    id: ItemDemandeId(format!("{id}-i1")),
                    demande_id: DemandeId(id.to_string()),
                    designation: "ciment 25kg".to_string(),
                    quantite_demandee: Decimal::new(12, 0),
                    quantite_sortie: None,
                    date_sortie: None,
                },
                ItemDemande {
                    id: ItemDemandeId(format!("{id}-i2")),
                    demande_id: DemandeId(id.to_string()),
                    designation: "sable 0/4 (m3)".to_string(),
                    quantite_demandee: Decimal::new(25, 1),
                    quantite_sortie: None,
                    date_sortie: None,
                },
            ],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trips_items_in_order() {
        let pool = setup().await;
        insert_creator(&pool, "u-employe").await;

        let repo = SqlDemandeRepository::new(pool);
        repo.create(sample_demande("d-1", "DEM-2026-0001")).await.expect("create");

        let found = repo.find_by_id(&DemandeId("d-1".to_string())).await.expect("find");
        let found = found.expect("should exist");

        assert_eq!(found.numero, "DEM-2026-0001");
        assert_eq!(found.status, DemandeStatus::EnAttenteValidationConducteur);
        assert_eq!(found.items.len(), 2);
        assert_eq!(found.items[0].designation, "ciment 25kg");
        assert_eq!(found.items[1].quantite_demandee, Decimal::new(25, 1));
    }

    #[tokio::test]
    async fn find_unknown_id_returns_none() {
        let pool = setup().await;
        let repo = SqlDemandeRepository::new(pool);
        let found = repo.find_by_id(&DemandeId("d-missing".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn next_numero_counts_per_year() {
        let pool = setup().await;
        insert_creator(&pool, "u-employe").await;

        let repo = SqlDemandeRepository::new(pool);
        let first = repo.next_numero().await.expect("numero");
        assert!(first.ends_with("-0001"), "first numero should be sequence 1, got {first}");

        repo.create(sample_demande("d-1", &first)).await.expect("create");
        let second = repo.next_numero().await.expect("numero");
        assert!(second.ends_with("-0002"), "second numero should be sequence 2, got {second}");
    }
}
