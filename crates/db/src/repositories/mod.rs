use async_trait::async_trait;
use thiserror::Error;

use approflow_core::domain::demande::{Demande, DemandeId};
use approflow_core::domain::signature::ValidationSignature;
use approflow_core::domain::user::{User, UserId};

pub mod demande;
pub mod signature;
pub mod user;

pub use demande::SqlDemandeRepository;
pub use signature::SqlSignatureRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DemandeRepository: Send + Sync {
    async fn find_by_id(&self, id: &DemandeId) -> Result<Option<Demande>, RepositoryError>;
    async fn create(&self, demande: Demande) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SignatureRepository: Send + Sync {
    async fn find_by_demande_id(
        &self,
        demande_id: &DemandeId,
    ) -> Result<Vec<ValidationSignature>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_api_token(&self, api_token: &str) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User, api_token: &str) -> Result<(), RepositoryError>;
}
