use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::demande::Demande;
use crate::domain::user::User;
use crate::errors::WorkflowError;
use crate::workflow::transitions::{plan_transition, TransitionPlan, WorkflowAction};

/// Thin wrapper over the transition table that pairs every planning
/// decision with an audit event. Execution stays in the store; the engine
/// never mutates anything.
#[derive(Clone, Debug, Default)]
pub struct WorkflowEngine;

impl WorkflowEngine {
    pub fn plan(
        &self,
        demande: &Demande,
        actor: &User,
        action: WorkflowAction,
    ) -> Result<TransitionPlan, WorkflowError> {
        plan_transition(demande.status, demande.demande_type, actor, action)
    }

    pub fn plan_with_audit(
        &self,
        demande: &Demande,
        actor: &User,
        action: WorkflowAction,
        sink: &dyn AuditSink,
        audit: &AuditContext,
    ) -> Result<TransitionPlan, WorkflowError> {
        let result = self.plan(demande, actor, action);
        match &result {
            Ok(plan) => {
                sink.emit(
                    AuditEvent::new(
                        audit.demande_id.clone(),
                        audit.correlation_id.clone(),
                        "workflow.transition_planned",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", plan.from.to_string())
                    .with_metadata("to", plan.to.to_string())
                    .with_metadata("step", plan.step.to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.demande_id.clone(),
                        audit.correlation_id.clone(),
                        "workflow.transition_rejected",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.code())
                    .with_metadata("detail", error.to_string()),
                );
            }
        }
        result
    }
}
