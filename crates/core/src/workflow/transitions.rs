//! Centralized transition table for the validation chain.
//!
//! Every route that used to decide transitions inline goes through
//! [`plan_transition`]: one function mapping `(current status, demande
//! type, actor, action)` to the next status and the signature step, or to
//! a typed refusal. The table is pure and owns no state; executing a plan
//! atomically is the store's job.

use serde::{Deserialize, Serialize};

use crate::domain::demande::{DemandeStatus, DemandeType};
use crate::domain::signature::ValidationStep;
use crate::domain::user::{Role, User};
use crate::errors::WorkflowError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Valider,
    Livrer,
    Cloturer,
    ModifierQuantiteSortie,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valider => "valider",
            Self::Livrer => "livrer",
            Self::Cloturer => "cloturer",
            Self::ModifierQuantiteSortie => "modifier_quantite_sortie",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "valider" => Some(Self::Valider),
            "livrer" => Some(Self::Livrer),
            "cloturer" => Some(Self::Cloturer),
            "modifier_quantite_sortie" => Some(Self::ModifierQuantiteSortie),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated transition: which status to leave, which to enter, and the
/// signature step the executing transaction must record exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub from: DemandeStatus,
    pub to: DemandeStatus,
    pub step: ValidationStep,
    pub action: WorkflowAction,
}

/// Roles allowed to act while the demande sits in `status`. Admin override
/// is handled by the caller; this is the per-step allow-list only.
pub fn allowed_roles(status: DemandeStatus) -> &'static [Role] {
    match status {
        DemandeStatus::EnAttenteValidationConducteur => &[Role::ConducteurTravaux],
        DemandeStatus::EnAttenteValidationQhse => {
            &[Role::ResponsableQhse, Role::ResponsableLogistique]
        }
        DemandeStatus::EnAttenteValidationResponsableTravaux => &[Role::ResponsableTravaux],
        DemandeStatus::EnAttenteValidationChargeAffaire => &[Role::ChargeAffaire],
        DemandeStatus::EnAttenteLivraison => &[Role::ResponsableAppro],
        DemandeStatus::Livree => &[Role::ResponsableAppro, Role::ResponsableLogistique],
        DemandeStatus::Cloturee => &[],
    }
}

fn edge(
    status: DemandeStatus,
    action: WorkflowAction,
) -> Option<(DemandeStatus, ValidationStep)> {
    use DemandeStatus as S;
    use ValidationStep as Step;
    use WorkflowAction as A;

    match (status, action) {
        (S::EnAttenteValidationConducteur, A::Valider) => {
            Some((S::EnAttenteValidationResponsableTravaux, Step::ValidationConducteur))
        }
        (S::EnAttenteValidationQhse, A::Valider) => {
            Some((S::EnAttenteValidationResponsableTravaux, Step::ValidationQhse))
        }
        (S::EnAttenteValidationResponsableTravaux, A::Valider) => {
            Some((S::EnAttenteValidationChargeAffaire, Step::ValidationResponsableTravaux))
        }
        (S::EnAttenteValidationChargeAffaire, A::Valider) => {
            Some((S::EnAttenteLivraison, Step::ValidationChargeAffaire))
        }
        (S::EnAttenteLivraison, A::Livrer) => Some((S::Livree, Step::Livraison)),
        (S::Livree, A::Cloturer) => Some((S::Cloturee, Step::Cloture)),
        _ => None,
    }
}

/// Decide whether `actor` may apply `action` to a demande currently in
/// `status`. Quantity corrections are edits, not transitions, and are
/// refused here; the store guards them with the modification window.
pub fn plan_transition(
    status: DemandeStatus,
    demande_type: DemandeType,
    actor: &User,
    action: WorkflowAction,
) -> Result<TransitionPlan, WorkflowError> {
    // A demande's entry status must match its type; a mismatch means the
    // row was corrupted outside the workflow.
    let type_mismatch = matches!(
        (status, demande_type),
        (DemandeStatus::EnAttenteValidationConducteur, DemandeType::Outillage)
            | (DemandeStatus::EnAttenteValidationQhse, DemandeType::Materiel)
    );
    if type_mismatch {
        return Err(WorkflowError::Internal(format!(
            "status `{status}` is not reachable for type `{demande_type}`"
        )));
    }

    let forbidden = || WorkflowError::Forbidden {
        role: actor.role,
        action: action.as_str().to_string(),
        status,
    };

    if status.is_terminal() || action == WorkflowAction::ModifierQuantiteSortie {
        return Err(forbidden());
    }

    let Some((to, step)) = edge(status, action) else {
        return Err(forbidden());
    };

    if !actor.has_admin_override() && !allowed_roles(status).contains(&actor.role) {
        return Err(forbidden());
    }

    Ok(TransitionPlan { from: status, to, step, action })
}

#[cfg(test)]
mod tests {
    use super::{plan_transition, TransitionPlan, WorkflowAction};
    use crate::domain::demande::{DemandeStatus, DemandeType};
    use crate::domain::signature::ValidationStep;
    use crate::domain::user::{Role, User, UserId};
    use crate::errors::WorkflowError;

    fn user(role: Role) -> User {
        User { id: UserId(format!("u-{}", role.as_str())), name: role.as_str().to_string(), role, is_admin: false }
    }

    #[test]
    fn materiel_chain_walks_every_declared_edge() {
        let steps = [
            (DemandeStatus::EnAttenteValidationConducteur, Role::ConducteurTravaux, WorkflowAction::Valider, DemandeStatus::EnAttenteValidationResponsableTravaux, ValidationStep::ValidationConducteur),
            (DemandeStatus::EnAttenteValidationResponsableTravaux, Role::ResponsableTravaux, WorkflowAction::Valider, DemandeStatus::EnAttenteValidationChargeAffaire, ValidationStep::ValidationResponsableTravaux),
            (DemandeStatus::EnAttenteValidationChargeAffaire, Role::ChargeAffaire, WorkflowAction::Valider, DemandeStatus::EnAttenteLivraison, ValidationStep::ValidationChargeAffaire),
            (DemandeStatus::EnAttenteLivraison, Role::ResponsableAppro, WorkflowAction::Livrer, DemandeStatus::Livree, ValidationStep::Livraison),
            (DemandeStatus::Livree, Role::ResponsableAppro, WorkflowAction::Cloturer, DemandeStatus::Cloturee, ValidationStep::Cloture),
        ];

        for (from, role, action, to, step) in steps {
            let plan = plan_transition(from, DemandeType::Materiel, &user(role), action)
                .expect("edge should be permitted");
            assert_eq!(plan, TransitionPlan { from, to, step, action });
        }
    }

    #[test]
    fn outillage_enters_through_qhse() {
        let plan = plan_transition(
            DemandeStatus::EnAttenteValidationQhse,
            DemandeType::Outillage,
            &user(Role::ResponsableQhse),
            WorkflowAction::Valider,
        )
        .expect("qhse validation should be permitted");
        assert_eq!(plan.to, DemandeStatus::EnAttenteValidationResponsableTravaux);
        assert_eq!(plan.step, ValidationStep::ValidationQhse);
    }

    #[test]
    fn logistique_may_also_clear_the_qhse_step() {
        let plan = plan_transition(
            DemandeStatus::EnAttenteValidationQhse,
            DemandeType::Outillage,
            &user(Role::ResponsableLogistique),
            WorkflowAction::Valider,
        );
        assert!(plan.is_ok());
    }

    #[test]
    fn appro_acting_first_on_materiel_is_forbidden() {
        let error = plan_transition(
            DemandeStatus::EnAttenteValidationConducteur,
            DemandeType::Materiel,
            &user(Role::ResponsableAppro),
            WorkflowAction::Valider,
        )
        .expect_err("appro must not skip the conducteur step");
        assert!(matches!(error, WorkflowError::Forbidden { .. }));
    }

    #[test]
    fn employe_cannot_trigger_any_transition() {
        for status in [
            DemandeStatus::EnAttenteValidationConducteur,
            DemandeStatus::EnAttenteValidationResponsableTravaux,
            DemandeStatus::EnAttenteValidationChargeAffaire,
        ] {
            let result = plan_transition(
                status,
                DemandeType::Materiel,
                &user(Role::Employe),
                WorkflowAction::Valider,
            );
            assert!(matches!(result, Err(WorkflowError::Forbidden { .. })));
        }
    }

    #[test]
    fn superadmin_is_allowed_at_every_step() {
        let admin = user(Role::Superadmin);
        assert!(plan_transition(
            DemandeStatus::EnAttenteValidationConducteur,
            DemandeType::Materiel,
            &admin,
            WorkflowAction::Valider,
        )
        .is_ok());
        assert!(plan_transition(
            DemandeStatus::EnAttenteLivraison,
            DemandeType::Materiel,
            &admin,
            WorkflowAction::Livrer,
        )
        .is_ok());
    }

    #[test]
    fn admin_flag_grants_the_same_override() {
        let mut flagged = user(Role::Employe);
        flagged.is_admin = true;
        assert!(plan_transition(
            DemandeStatus::EnAttenteValidationChargeAffaire,
            DemandeType::Materiel,
            &flagged,
            WorkflowAction::Valider,
        )
        .is_ok());
    }

    #[test]
    fn terminal_status_refuses_everything() {
        let result = plan_transition(
            DemandeStatus::Cloturee,
            DemandeType::Materiel,
            &user(Role::Superadmin),
            WorkflowAction::Valider,
        );
        assert!(matches!(result, Err(WorkflowError::Forbidden { .. })));
    }

    #[test]
    fn skipping_a_stage_is_not_an_edge() {
        // charge_affaire trying to deliver from their own validation stage
        let result = plan_transition(
            DemandeStatus::EnAttenteValidationChargeAffaire,
            DemandeType::Materiel,
            &user(Role::ChargeAffaire),
            WorkflowAction::Livrer,
        );
        assert!(matches!(result, Err(WorkflowError::Forbidden { .. })));
    }

    #[test]
    fn quantity_correction_is_not_a_transition() {
        let result = plan_transition(
            DemandeStatus::Livree,
            DemandeType::Materiel,
            &user(Role::ResponsableAppro),
            WorkflowAction::ModifierQuantiteSortie,
        );
        assert!(matches!(result, Err(WorkflowError::Forbidden { .. })));
    }

    #[test]
    fn status_type_mismatch_is_an_internal_error() {
        let result = plan_transition(
            DemandeStatus::EnAttenteValidationQhse,
            DemandeType::Materiel,
            &user(Role::ResponsableQhse),
            WorkflowAction::Valider,
        );
        assert!(matches!(result, Err(WorkflowError::Internal(_))));
    }
}
