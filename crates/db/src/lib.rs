//! SQLite persistence for the approval workflow: connection management,
//! migrations, repositories, and the transactional workflow store.

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod workflow_store;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use repositories::{
    DemandeRepository, RepositoryError, SignatureRepository, SqlDemandeRepository,
    SqlSignatureRepository, SqlUserRepository, UserRepository,
};
pub use workflow_store::{QuantiteSortie, SqlWorkflowStore, TransitionReceipt};
