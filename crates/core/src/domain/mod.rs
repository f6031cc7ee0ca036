pub mod demande;
pub mod signature;
pub mod user;
