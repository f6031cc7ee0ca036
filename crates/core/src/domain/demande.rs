use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DemandeId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemDemandeId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandeType {
    Materiel,
    Outillage,
}

impl DemandeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Materiel => "materiel",
            Self::Outillage => "outillage",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "materiel" => Some(Self::Materiel),
            "outillage" => Some(Self::Outillage),
            _ => None,
        }
    }
}

/// Complete status enumeration for the validation chain. `materiel`
/// demandes enter at the conducteur step, `outillage` demandes at the QHSE
/// step; both chains merge at the responsable travaux step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandeStatus {
    EnAttenteValidationConducteur,
    EnAttenteValidationQhse,
    EnAttenteValidationResponsableTravaux,
    EnAttenteValidationChargeAffaire,
    EnAttenteLivraison,
    Livree,
    Cloturee,
}

impl DemandeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnAttenteValidationConducteur => "en_attente_validation_conducteur",
            Self::EnAttenteValidationQhse => "en_attente_validation_qhse",
            Self::EnAttenteValidationResponsableTravaux => {
                "en_attente_validation_responsable_travaux"
            }
            Self::EnAttenteValidationChargeAffaire => "en_attente_validation_charge_affaire",
            Self::EnAttenteLivraison => "en_attente_livraison",
            Self::Livree => "livree",
            Self::Cloturee => "cloturee",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en_attente_validation_conducteur" => Some(Self::EnAttenteValidationConducteur),
            "en_attente_validation_qhse" => Some(Self::EnAttenteValidationQhse),
            "en_attente_validation_responsable_travaux" => {
                Some(Self::EnAttenteValidationResponsableTravaux)
            }
            "en_attente_validation_charge_affaire" => Some(Self::EnAttenteValidationChargeAffaire),
            "en_attente_livraison" => Some(Self::EnAttenteLivraison),
            "livree" => Some(Self::Livree),
            "cloturee" => Some(Self::Cloturee),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cloturee)
    }

    /// Type-dependent entry point of the validation chain.
    pub fn initial_for(demande_type: DemandeType) -> Self {
        match demande_type {
            DemandeType::Materiel => Self::EnAttenteValidationConducteur,
            DemandeType::Outillage => Self::EnAttenteValidationQhse,
        }
    }
}

impl std::fmt::Display for DemandeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for DemandeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemDemande {
    pub id: ItemDemandeId,
    pub demande_id: DemandeId,
    pub designation: String,
    pub quantite_demandee: Decimal,
    pub quantite_sortie: Option<Decimal>,
    pub date_sortie: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Demande {
    pub id: DemandeId,
    pub numero: String,
    pub demande_type: DemandeType,
    pub status: DemandeStatus,
    pub created_by: UserId,
    pub project_id: String,
    pub items: Vec<ItemDemande>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Human-readable sequence number, e.g. `DEM-2026-0042`.
pub fn format_numero(year: i32, sequence: u32) -> String {
    format!("DEM-{year}-{sequence:04}")
}

#[cfg(test)]
mod tests {
    use super::{format_numero, DemandeStatus, DemandeType};

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            DemandeStatus::EnAttenteValidationConducteur,
            DemandeStatus::EnAttenteValidationQhse,
            DemandeStatus::EnAttenteValidationResponsableTravaux,
            DemandeStatus::EnAttenteValidationChargeAffaire,
            DemandeStatus::EnAttenteLivraison,
            DemandeStatus::Livree,
            DemandeStatus::Cloturee,
        ] {
            assert_eq!(DemandeStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn materiel_enters_at_conducteur_step() {
        assert_eq!(
            DemandeStatus::initial_for(DemandeType::Materiel),
            DemandeStatus::EnAttenteValidationConducteur,
        );
    }

    #[test]
    fn outillage_enters_at_qhse_step() {
        assert_eq!(
            DemandeStatus::initial_for(DemandeType::Outillage),
            DemandeStatus::EnAttenteValidationQhse,
        );
    }

    #[test]
    fn only_cloturee_is_terminal() {
        assert!(DemandeStatus::Cloturee.is_terminal());
        assert!(!DemandeStatus::Livree.is_terminal());
        assert!(!DemandeStatus::EnAttenteLivraison.is_terminal());
    }

    #[test]
    fn numero_is_zero_padded() {
        assert_eq!(format_numero(2026, 42), "DEM-2026-0042");
        assert_eq!(format_numero(2026, 12345), "DEM-2026-12345");
    }
}
