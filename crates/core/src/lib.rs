pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod stamp;
pub mod window;
pub mod workflow;

pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    TracingAuditSink,
};
pub use domain::demande::{
    format_numero, Demande, DemandeId, DemandeStatus, DemandeType, ItemDemande, ItemDemandeId,
};
pub use domain::signature::{SignatureId, ValidationSignature, ValidationStep};
pub use domain::user::{Role, User, UserId};
pub use errors::WorkflowError;
pub use stamp::{StampPayload, Stamper};
pub use window::{can_modify, elapsed_minutes, MODIFICATION_WINDOW_MINUTES};
pub use workflow::{allowed_roles, plan_transition, TransitionPlan, WorkflowAction, WorkflowEngine};
