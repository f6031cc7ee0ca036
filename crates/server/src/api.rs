//! JSON API for demandes and workflow actions.
//!
//! Endpoints:
//! - `POST /api/demandes`                  — create a demande with its items
//! - `GET  /api/demandes/{id}`             — fetch a demande and its items
//! - `GET  /api/demandes/{id}/signatures`  — list the validation trail
//! - `POST /api/demandes/{id}/actions`     — apply a workflow action
//!
//! Refusals map onto the workflow taxonomy: 401 unauthenticated, 403
//! forbidden and expired_window, 404 not_found, 409 conflict, 500
//! internal. Malformed payloads are 422.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use approflow_core::domain::demande::{
    Demande, DemandeId, DemandeStatus, DemandeType, ItemDemande, ItemDemandeId,
};
use approflow_core::errors::WorkflowError;
use approflow_core::workflow::WorkflowAction;
use approflow_db::{
    DbPool, DemandeRepository, QuantiteSortie, RepositoryError, SignatureRepository,
    SqlDemandeRepository, SqlSignatureRepository, SqlUserRepository, SqlWorkflowStore,
};
use approflow_notify::{dispatch, Notifier, TransitionNotification};

use crate::auth::authenticate;

#[derive(Clone)]
pub struct ApiState {
    db_pool: DbPool,
    store: Arc<SqlWorkflowStore>,
    notifier: Arc<dyn Notifier>,
}

impl ApiState {
    pub fn new(db_pool: DbPool, store: Arc<SqlWorkflowStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { db_pool, store, notifier }
    }

    fn users(&self) -> SqlUserRepository {
        SqlUserRepository::new(self.db_pool.clone())
    }

    fn demandes(&self) -> SqlDemandeRepository {
        SqlDemandeRepository::new(self.db_pool.clone())
    }

    fn signatures(&self) -> SqlSignatureRepository {
        SqlSignatureRepository::new(self.db_pool.clone())
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/demandes", post(create_demande))
        .route("/api/demandes/{id}", get(get_demande))
        .route("/api/demandes/{id}/signatures", get(list_signatures))
        .route("/api/demandes/{id}/actions", post(post_action))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateDemandeRequest {
    pub demande_type: DemandeType,
    pub project_id: String,
    pub items: Vec<CreateItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub designation: String,
    pub quantite_demandee: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    pub comment: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemQuantityRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ItemQuantityRequest {
    pub item_id: String,
    pub quantite: Decimal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Workflow(WorkflowError),
    Validation(String),
}

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        Self::Workflow(error)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        Self::Workflow(WorkflowError::Internal(error.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorBody { error: "validation", message }),
            )
                .into_response(),
            Self::Workflow(workflow_error) => {
                let status = match &workflow_error {
                    WorkflowError::Unauthenticated => StatusCode::UNAUTHORIZED,
                    WorkflowError::Forbidden { .. } => StatusCode::FORBIDDEN,
                    WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                    WorkflowError::ExpiredWindow { .. } => StatusCode::FORBIDDEN,
                    WorkflowError::Conflict { .. } => StatusCode::CONFLICT,
                    WorkflowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(
                        event_name = "api.internal_error",
                        error = %workflow_error,
                        "request failed with internal error"
                    );
                }
                let body = ErrorBody {
                    error: workflow_error.code(),
                    message: workflow_error.to_string(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn create_demande(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CreateDemandeRequest>,
) -> Result<(StatusCode, Json<Demande>), ApiError> {
    let user = authenticate(&state.users(), &headers).await?;

    if body.items.is_empty() {
        return Err(ApiError::Validation("a demande requires at least one item".to_string()));
    }
    for item in &body.items {
        if item.designation.trim().is_empty() {
            return Err(ApiError::Validation("item designation must not be empty".to_string()));
        }
        if item.quantite_demandee <= Decimal::ZERO {
            return Err(ApiError::Validation(format!(
                "requested quantity for `{}` must be positive",
                item.designation
            )));
        }
    }

    let repo = state.demandes();
    let numero = repo.next_numero().await?;
    let now = Utc::now();
    let demande_id = DemandeId(Uuid::new_v4().to_string());

    let items = body
        .items
        .iter()
        .map(|item| ItemDemande {
            id: ItemDemandeId(Uuid::new_v4().to_string()),
            demande_id: demande_id.clone(),
            designation: item.designation.trim().to_string(),
            quantite_demandee: item.quantite_demandee,
            quantite_sortie: None,
            date_sortie: None,
        })
        .collect();

    let demande = Demande {
        id: demande_id,
        numero,
        demande_type: body.demande_type,
        status: DemandeStatus::initial_for(body.demande_type),
        created_by: user.id,
        project_id: body.project_id,
        items,
        created_at: now,
        updated_at: now,
    };

    repo.create(demande.clone()).await?;
    info!(
        event_name = "api.demande_created",
        numero = %demande.numero,
        demande_type = %demande.demande_type,
        "demande created"
    );

    Ok((StatusCode::CREATED, Json(demande)))
}

pub async fn get_demande(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Demande>, ApiError> {
    authenticate(&state.users(), &headers).await?;

    let demande = state
        .demandes()
        .find_by_id(&DemandeId(id.clone()))
        .await?
        .ok_or(WorkflowError::NotFound(id))?;
    Ok(Json(demande))
}

pub async fn list_signatures(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authenticate(&state.users(), &headers).await?;

    let demande_id = DemandeId(id.clone());
    if state.demandes().find_by_id(&demande_id).await?.is_none() {
        return Err(WorkflowError::NotFound(id).into());
    }

    let signatures = state.signatures().find_by_demande_id(&demande_id).await?;
    Ok(Json(signatures).into_response())
}

pub async fn post_action(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ActionRequest>,
) -> Result<Response, ApiError> {
    let user = authenticate(&state.users(), &headers).await?;

    let Some(action) = WorkflowAction::parse(&body.action) else {
        return Err(ApiError::Validation(format!("unknown action `{}`", body.action)));
    };

    let demande_id = DemandeId(id);
    let quantities: Vec<QuantiteSortie> = body
        .items
        .iter()
        .map(|item| QuantiteSortie {
            item_id: ItemDemandeId(item.item_id.clone()),
            quantite: item.quantite,
        })
        .collect();
    let now = Utc::now();

    if action == WorkflowAction::ModifierQuantiteSortie {
        if quantities.is_empty() {
            return Err(ApiError::Validation(
                "at least one item quantity is required".to_string(),
            ));
        }
        let demande =
            state.store.update_quantites_sortie(&demande_id, &user, &quantities, now).await?;
        info!(
            event_name = "api.quantities_updated",
            numero = %demande.numero,
            "delivered quantities corrected"
        );
        return Ok(Json(demande).into_response());
    }

    let receipt =
        state.store.apply_transition(&demande_id, &user, action, body.comment, &quantities, now).await?;

    info!(
        event_name = "api.transition_applied",
        numero = %receipt.numero,
        from = %receipt.from,
        to = %receipt.to,
        "workflow transition applied"
    );

    // Fire and forget: a committed transition is never undone because a
    // notification failed.
    let _ = dispatch(
        state.notifier.clone(),
        TransitionNotification {
            demande_id: receipt.demande_id.0.clone(),
            numero: receipt.numero.clone(),
            from: receipt.from.as_str().to_string(),
            to: receipt.to.as_str().to_string(),
            step: receipt.signature.step.as_str().to_string(),
            action: receipt.signature.action.clone(),
            actor_id: receipt.signature.user_id.0.clone(),
            occurred_at: receipt.signature.created_at,
        },
    );

    Ok(Json(receipt).into_response())
}
