use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::demande::DemandeId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureId(pub String);

/// Approval steps of the validation chain. One signature row exists per
/// `(demande, step)` pair; the pair is the dedup key behind the UNIQUE
/// index in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStep {
    ValidationConducteur,
    ValidationQhse,
    ValidationResponsableTravaux,
    ValidationChargeAffaire,
    Livraison,
    Cloture,
}

impl ValidationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationConducteur => "validation_conducteur",
            Self::ValidationQhse => "validation_qhse",
            Self::ValidationResponsableTravaux => "validation_responsable_travaux",
            Self::ValidationChargeAffaire => "validation_charge_affaire",
            Self::Livraison => "livraison",
            Self::Cloture => "cloture",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "validation_conducteur" => Some(Self::ValidationConducteur),
            "validation_qhse" => Some(Self::ValidationQhse),
            "validation_responsable_travaux" => Some(Self::ValidationResponsableTravaux),
            "validation_charge_affaire" => Some(Self::ValidationChargeAffaire),
            "livraison" => Some(Self::Livraison),
            "cloture" => Some(Self::Cloture),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValidationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSignature {
    pub id: SignatureId,
    pub demande_id: DemandeId,
    pub user_id: UserId,
    pub step: ValidationStep,
    pub action: String,
    pub comment: Option<String>,
    pub stamp: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::ValidationStep;

    #[test]
    fn step_round_trips_through_str() {
        for step in [
            ValidationStep::ValidationConducteur,
            ValidationStep::ValidationQhse,
            ValidationStep::ValidationResponsableTravaux,
            ValidationStep::ValidationChargeAffaire,
            ValidationStep::Livraison,
            ValidationStep::Cloture,
        ] {
            assert_eq!(ValidationStep::parse(step.as_str()), Some(step));
        }
    }
}
