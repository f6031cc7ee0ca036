use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Workflow roles. `Superadmin` (or the `is_admin` flag on a user) is
/// accepted at every validation step; `Employe` can create demandes but
/// triggers no transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employe,
    ConducteurTravaux,
    ResponsableTravaux,
    ResponsableQhse,
    ResponsableLogistique,
    ChargeAffaire,
    ResponsableAppro,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employe => "employe",
            Self::ConducteurTravaux => "conducteur_travaux",
            Self::ResponsableTravaux => "responsable_travaux",
            Self::ResponsableQhse => "responsable_qhse",
            Self::ResponsableLogistique => "responsable_logistique",
            Self::ChargeAffaire => "charge_affaire",
            Self::ResponsableAppro => "responsable_appro",
            Self::Superadmin => "superadmin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employe" => Some(Self::Employe),
            "conducteur_travaux" => Some(Self::ConducteurTravaux),
            "responsable_travaux" => Some(Self::ResponsableTravaux),
            "responsable_qhse" => Some(Self::ResponsableQhse),
            "responsable_logistique" => Some(Self::ResponsableLogistique),
            "charge_affaire" => Some(Self::ChargeAffaire),
            "responsable_appro" => Some(Self::ResponsableAppro),
            "superadmin" => Some(Self::Superadmin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub is_admin: bool,
}

impl User {
    /// Admin override applies to the `is_admin` flag and the superadmin role
    /// alike; both bypass per-step role allow-lists.
    pub fn has_admin_override(&self) -> bool {
        self.is_admin || self.role == Role::Superadmin
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, User, UserId};

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            Role::Employe,
            Role::ConducteurTravaux,
            Role::ResponsableTravaux,
            Role::ResponsableQhse,
            Role::ResponsableLogistique,
            Role::ChargeAffaire,
            Role::ResponsableAppro,
            Role::Superadmin,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn unknown_role_parses_to_none() {
        assert_eq!(Role::parse("stagiaire"), None);
    }

    #[test]
    fn admin_flag_grants_override_regardless_of_role() {
        let user = User {
            id: UserId("u-1".to_string()),
            name: "Alice".to_string(),
            role: Role::Employe,
            is_admin: true,
        };
        assert!(user.has_admin_override());
    }
}
