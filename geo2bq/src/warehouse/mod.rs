//! Accès à l'entrepôt de données (BigQuery)

pub mod auth;
pub mod backfill;
pub mod bigquery;

pub use backfill::{run_backfill, BackfillError, BackfillOutcome, LoadStage};
pub use bigquery::BigQueryClient;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{TableRef, WriteMode};
use crate::table::Dataset;

/// Erreurs de l'entrepôt (authentification, réseau, API, jobs)
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Failed to read credentials {}: {source}", .path.display())]
    CredentialsFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid service account key: {0}")]
    Credentials(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("BigQuery API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("BigQuery job {job_id} failed: {message}")]
    Job { job_id: String, message: String },

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Entrepôt capable de charger une table et d'exécuter du SQL
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Charge le jeu de données dans la table ; retourne le nombre de lignes écrites
    async fn write_table(
        &self,
        table: &TableRef,
        dataset: &Dataset,
        mode: WriteMode,
    ) -> Result<u64, WarehouseError>;

    /// Exécute une requête SQL jusqu'à sa fin ; retourne les lignes affectées (DML)
    async fn execute(&self, sql: &str) -> Result<Option<u64>, WarehouseError>;
}
