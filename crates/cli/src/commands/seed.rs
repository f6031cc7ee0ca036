use chrono::Utc;
use rust_decimal::Decimal;

use crate::commands::CommandResult;
use approflow_core::config::{AppConfig, LoadOptions};
use approflow_core::domain::demande::{
    Demande, DemandeId, DemandeStatus, DemandeType, ItemDemande, ItemDemandeId,
};
use approflow_core::domain::user::{Role, User, UserId};
use approflow_db::{
    connect_with_config, migrations, DbPool, DemandeRepository, SqlDemandeRepository,
    SqlUserRepository, UserRepository,
};

/// Demo users, one per role. Tokens are deterministic so local API calls
/// can be scripted against a seeded database.
const DEMO_USERS: &[(&str, &str, Role)] = &[
    ("u-employe", "Émile Ouvrier", Role::Employe),
    ("u-conducteur", "Claire Conduite", Role::ConducteurTravaux),
    ("u-resp-travaux", "Rachid Travaux", Role::ResponsableTravaux),
    ("u-qhse", "Quentin Hygiène", Role::ResponsableQhse),
    ("u-logistique", "Lise Logistique", Role::ResponsableLogistique),
    ("u-charge", "Chafia Affaire", Role::ChargeAffaire),
    ("u-appro", "Antoine Appro", Role::ResponsableAppro),
    ("u-admin", "Alex Admin", Role::Superadmin),
];

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let summary = load_fixtures(&pool)
            .await
            .map_err(|error| ("seed_execution", error, 6u8))?;

        pool.close().await;
        Ok::<SeedSummary, (&'static str, String, u8)>(summary)
    });

    match result {
        Ok(summary) => CommandResult::success(
            "seed",
            format!(
                "seeded {} users and {} demandes (rerun is a no-op for existing demandes)",
                summary.users, summary.demandes
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

struct SeedSummary {
    users: usize,
    demandes: usize,
}

async fn load_fixtures(pool: &DbPool) -> Result<SeedSummary, String> {
    let users = SqlUserRepository::new(pool.clone());
    for (id, name, role) in DEMO_USERS {
        users
            .save(
                User {
                    id: UserId((*id).to_string()),
                    name: (*name).to_string(),
                    role: *role,
                    is_admin: *role == Role::Superadmin,
                },
                &format!("tok-{id}"),
            )
            .await
            .map_err(|error| format!("user `{id}`: {error}"))?;
    }

    let demandes = SqlDemandeRepository::new(pool.clone());
    let mut created = 0;
    for (id, demande_type, project, items) in demo_demandes() {
        let existing = demandes
            .find_by_id(&DemandeId(id.clone()))
            .await
            .map_err(|error| format!("demande `{id}`: {error}"))?;
        if existing.is_some() {
            continue;
        }

        let numero =
            demandes.next_numero().await.map_err(|error| format!("numero: {error}"))?;
        let now = Utc::now();
        let demande = Demande {
            id: DemandeId(id.clone()),
            numero,
            demande_type,
            status: DemandeStatus::initial_for(demande_type),
            created_by: UserId("u-employe".to_string()),
            project_id: project,
            items: items
                .into_iter()
                .enumerate()
                .map(|(index, (designation, quantite))| ItemDemande {
                    id: ItemDemandeId(format!("{id}-i{}", index + 1)),
                    demande_id: DemandeId(id.clone()),
                    designation,
                    quantite_demandee: quantite,
                    quantite_sortie: None,
                    date_sortie: None,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        };
        demandes.create(demande).await.map_err(|error| format!("demande `{id}`: {error}"))?;
        created += 1;
    }

    Ok(SeedSummary { users: DEMO_USERS.len(), demandes: created })
}

#[allow(clippy::type_complexity)]
fn demo_demandes() -> Vec<(String, DemandeType, String, Vec<(String, Decimal)>)> {
    vec![
        (
            "seed-materiel-1".to_string(),
            DemandeType::Materiel,
            "chantier-nord".to_string(),
            vec![
                ("ciment 25kg".to_string(), Decimal::new(40, 0)),
                ("sable 0/4 (m3)".to_string(), Decimal::new(35, 1)),
            ],
        ),
        (
            "seed-outillage-1".to_string(),
            DemandeType::Outillage,
            "chantier-sud".to_string(),
            vec![("perforateur SDS".to_string(), Decimal::new(2, 0))],
        ),
    ]
}
