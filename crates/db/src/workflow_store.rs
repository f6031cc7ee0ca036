//! Transactional execution of workflow transitions.
//!
//! The store owns the only write path for demande status and validation
//! signatures. A transition is one SQLite transaction: status-guarded
//! UPDATE, signature INSERT (backed by the UNIQUE `(demande_id, step)`
//! index), and, for deliveries, the item quantity writes. Either all of it
//! commits or none of it does; a raced transition loses on the guarded
//! UPDATE or on the unique index and surfaces as `Conflict`.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use approflow_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink,
};
use approflow_core::domain::demande::{Demande, DemandeId, DemandeStatus, ItemDemandeId};
use approflow_core::domain::signature::{SignatureId, ValidationSignature};
use approflow_core::domain::user::{Role, User};
use approflow_core::errors::WorkflowError;
use approflow_core::stamp::{StampPayload, Stamper};
use approflow_core::window::{can_modify, elapsed_minutes, MODIFICATION_WINDOW_MINUTES};
use approflow_core::workflow::{WorkflowAction, WorkflowEngine};

use crate::repositories::demande::{row_to_demande_head, row_to_item};
use crate::DbPool;

/// Delivered (or corrected) quantity for one line item.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantiteSortie {
    pub item_id: ItemDemandeId,
    pub quantite: Decimal,
}

/// Outcome of a committed transition.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TransitionReceipt {
    pub demande_id: DemandeId,
    pub numero: String,
    pub from: DemandeStatus,
    pub to: DemandeStatus,
    pub signature: ValidationSignature,
}

pub struct SqlWorkflowStore {
    pool: DbPool,
    stamper: Stamper,
    engine: WorkflowEngine,
    audit: Arc<dyn AuditSink>,
}

impl SqlWorkflowStore {
    pub fn new(pool: DbPool, stamper: Stamper) -> Self {
        Self { pool, stamper, engine: WorkflowEngine, audit: Arc::new(TracingAuditSink) }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Apply `action` to the demande as `actor`, recording exactly one
    /// signature for the step. `quantities` is consulted for `livrer`
    /// only; items without an entry are delivered at the requested
    /// quantity.
    pub async fn apply_transition(
        &self,
        demande_id: &DemandeId,
        actor: &User,
        action: WorkflowAction,
        comment: Option<String>,
        quantities: &[QuantiteSortie],
        now: DateTime<Utc>,
    ) -> Result<TransitionReceipt, WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let demande = load_demande(&mut tx, demande_id).await?;
        let audit =
            AuditContext::new(Some(demande_id.clone()), Uuid::new_v4().to_string(), actor.id.0.clone());
        let plan =
            self.engine.plan_with_audit(&demande, actor, action, self.audit.as_ref(), &audit)?;

        let updated = match sqlx::query(
            "UPDATE demande SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(plan.to.as_str())
        .bind(now.to_rfc3339())
        .bind(&demande_id.0)
        .bind(plan.from.as_str())
        .execute(&mut *tx)
        .await
        {
            Ok(updated) => updated,
            // SQLITE_BUSY on the status write: a concurrent transaction holds
            // or has committed a conflicting write over this read snapshot,
            // so the race is already lost.
            Err(error) if is_busy(&error) => {
                self.emit_conflict(&audit, demande_id, plan.from);
                return Err(WorkflowError::Conflict { expected: plan.from });
            }
            Err(error) => return Err(internal(error)),
        };

        if updated.rows_affected() == 0 {
            self.emit_conflict(&audit, demande_id, plan.from);
            return Err(WorkflowError::Conflict { expected: plan.from });
        }

        let payload = StampPayload::new(
            actor.id.clone(),
            action.as_str(),
            now,
            Some(json!({
                "numero": demande.numero,
                "step": plan.step.as_str(),
                "from": plan.from.as_str(),
                "to": plan.to.as_str(),
                "comment": comment.as_deref(),
            })),
        );
        let signature = ValidationSignature {
            id: SignatureId(Uuid::new_v4().to_string()),
            demande_id: demande_id.clone(),
            user_id: actor.id.clone(),
            step: plan.step,
            action: action.as_str().to_string(),
            comment,
            stamp: self.stamper.stamp(&payload),
            created_at: now,
        };

        let inserted = sqlx::query(
            "INSERT INTO validation_signature (id, demande_id, user_id, step, action, comment,
                                               stamp, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&signature.id.0)
        .bind(&signature.demande_id.0)
        .bind(&signature.user_id.0)
        .bind(signature.step.as_str())
        .bind(&signature.action)
        .bind(&signature.comment)
        .bind(&signature.stamp)
        .bind(now.to_rfc3339_opts(SecondsFormat::Millis, true))
        .execute(&mut *tx)
        .await;

        if let Err(error) = inserted {
            // A duplicate (demande, step) signature means a concurrent
            // transition already recorded this step.
            if let sqlx::Error::Database(db_error) = &error {
                if db_error.is_unique_violation() {
                    self.emit_conflict(&audit, demande_id, plan.from);
                    return Err(WorkflowError::Conflict { expected: plan.from });
                }
            }
            return Err(internal(error));
        }

        if action == WorkflowAction::Livrer {
            write_delivery(&mut tx, &demande, quantities, now).await?;
        }

        tx.commit().await.map_err(internal)?;

        self.audit.emit(
            AuditEvent::new(
                Some(demande_id.clone()),
                audit.correlation_id,
                "workflow.transition_applied",
                AuditCategory::Workflow,
                audit.actor,
                AuditOutcome::Success,
            )
            .with_metadata("from", plan.from.as_str())
            .with_metadata("to", plan.to.as_str())
            .with_metadata("signature_id", signature.id.0.clone()),
        );

        Ok(TransitionReceipt {
            demande_id: demande_id.clone(),
            numero: demande.numero,
            from: plan.from,
            to: plan.to,
            signature,
        })
    }

    /// Correct delivered quantities within the modification window. This
    /// is an edit, not a transition: no signature is appended and the
    /// status stays `livree`.
    pub async fn update_quantites_sortie(
        &self,
        demande_id: &DemandeId,
        actor: &User,
        quantities: &[QuantiteSortie],
        now: DateTime<Utc>,
    ) -> Result<Demande, WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let demande = load_demande(&mut tx, demande_id).await?;

        let authorized =
            actor.has_admin_override() || actor.role == Role::ResponsableAppro;
        if demande.status != DemandeStatus::Livree || !authorized {
            return Err(WorkflowError::Forbidden {
                role: actor.role,
                action: WorkflowAction::ModifierQuantiteSortie.as_str().to_string(),
                status: demande.status,
            });
        }

        for quantity in quantities {
            let item = demande
                .items
                .iter()
                .find(|item| item.id == quantity.item_id)
                .ok_or_else(|| WorkflowError::NotFound(quantity.item_id.0.clone()))?;

            let Some(date_sortie) = item.date_sortie else {
                return Err(WorkflowError::Forbidden {
                    role: actor.role,
                    action: WorkflowAction::ModifierQuantiteSortie.as_str().to_string(),
                    status: demande.status,
                });
            };

            if !can_modify(date_sortie, now) {
                return Err(WorkflowError::ExpiredWindow {
                    elapsed_minutes: elapsed_minutes(date_sortie, now),
                    limit_minutes: MODIFICATION_WINDOW_MINUTES,
                });
            }

            sqlx::query("UPDATE item_demande SET quantite_sortie = ? WHERE id = ?")
                .bind(quantity.quantite.to_string())
                .bind(&quantity.item_id.0)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
        }

        sqlx::query("UPDATE demande SET updated_at = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(&demande_id.0)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

        tx.commit().await.map_err(internal)?;

        load_demande_from_pool(&self.pool, demande_id).await
    }

    fn emit_conflict(&self, audit: &AuditContext, demande_id: &DemandeId, expected: DemandeStatus) {
        self.audit.emit(
            AuditEvent::new(
                Some(demande_id.clone()),
                audit.correlation_id.clone(),
                "workflow.transition_conflicted",
                AuditCategory::Workflow,
                audit.actor.clone(),
                AuditOutcome::Rejected,
            )
            .with_metadata("expected_status", expected.as_str()),
        );
    }
}

fn internal(error: sqlx::Error) -> WorkflowError {
    WorkflowError::Internal(error.to_string())
}

/// SQLITE_BUSY (5) and its extended codes, BUSY_RECOVERY (261) and
/// BUSY_SNAPSHOT (517).
fn is_busy(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => {
            matches!(db_error.code().as_deref(), Some("5") | Some("261") | Some("517"))
        }
        _ => false,
    }
}

async fn load_demande(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    demande_id: &DemandeId,
) -> Result<Demande, WorkflowError> {
    let row = sqlx::query(
        "SELECT id, numero, demande_type, status, created_by, project_id, created_at, updated_at
         FROM demande WHERE id = ?",
    )
    .bind(&demande_id.0)
    .fetch_optional(&mut **tx)
    .await
    .map_err(internal)?;

    let Some(ref row) = row else {
        return Err(WorkflowError::NotFound(demande_id.0.clone()));
    };
    let mut demande =
        row_to_demande_head(row).map_err(|e| WorkflowError::Internal(e.to_string()))?;

    let item_rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
        "SELECT id, demande_id, designation, quantite_demandee, quantite_sortie, date_sortie
         FROM item_demande WHERE demande_id = ? ORDER BY position ASC",
    )
    .bind(&demande_id.0)
    .fetch_all(&mut **tx)
    .await
    .map_err(internal)?;

    demande.items = item_rows
        .iter()
        .map(row_to_item)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| WorkflowError::Internal(e.to_string()))?;

    Ok(demande)
}

async fn load_demande_from_pool(
    pool: &DbPool,
    demande_id: &DemandeId,
) -> Result<Demande, WorkflowError> {
    let mut tx = pool.begin().await.map_err(internal)?;
    let demande = load_demande(&mut tx, demande_id).await?;
    tx.commit().await.map_err(internal)?;
    Ok(demande)
}

async fn write_delivery(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    demande: &Demande,
    quantities: &[QuantiteSortie],
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    for quantity in quantities {
        if !demande.items.iter().any(|item| item.id == quantity.item_id) {
            return Err(WorkflowError::NotFound(quantity.item_id.0.clone()));
        }
    }

    for item in &demande.items {
        let delivered = quantities
            .iter()
            .find(|quantity| quantity.item_id == item.id)
            .map(|quantity| quantity.quantite)
            .unwrap_or(item.quantite_demandee);

        sqlx::query(
            "UPDATE item_demande SET quantite_sortie = ?, date_sortie = ? WHERE id = ?",
        )
        .bind(delivered.to_string())
        .bind(now.to_rfc3339())
        .bind(&item.id.0)
        .execute(&mut **tx)
        .await
        .map_err(internal)?;
    }

    Ok(())
}
