//! Configuration d'un chargement
//!
//! Ordre de priorité : valeurs par défaut, fichier JSON (`--config`),
//! variables d'environnement, puis options CLI.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use geoprep::{WEB_MERCATOR_EPSG, WGS84_EPSG};

/// Variable d'environnement standard des clés de compte de service
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Projet BigQuery par défaut
pub const PROJECT_ENV: &str = "GEO2BQ_PROJECT";

/// Erreurs de configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Missing destination table (expected `dataset.table`)")]
    MissingDestination,

    #[error("Missing credentials path (use --credentials or GOOGLE_APPLICATION_CREDENTIALS)")]
    MissingCredentials,

    #[error("No project id for table `{0}` (use --project, GEO2BQ_PROJECT or a key with project_id)")]
    MissingProject(String),

    #[error("Invalid table reference `{0}`: expected `dataset.table` or `project.dataset.table`")]
    InvalidTable(String),

    #[error("Invalid write mode: {0}. Use: replace, append")]
    InvalidWriteMode(String),
}

/// Politique d'écriture de la table destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Remplace la table (défaut)
    #[default]
    Replace,
    /// Ajoute les lignes à la table existante
    Append,
}

impl WriteMode {
    /// Valeur `writeDisposition` d'un job de chargement BigQuery
    pub fn write_disposition(self) -> &'static str {
        match self {
            WriteMode::Replace => "WRITE_TRUNCATE",
            WriteMode::Append => "WRITE_APPEND",
        }
    }
}

impl FromStr for WriteMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" | "truncate" => Ok(WriteMode::Replace),
            "append" => Ok(WriteMode::Append),
            _ => Err(ConfigError::InvalidWriteMode(s.to_string())),
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Replace => write!(f, "replace"),
            WriteMode::Append => write!(f, "append"),
        }
    }
}

/// Référence complète `project.dataset.table`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

fn dataset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex"))
}

fn table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"))
}

fn project_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Les projets "domain-scoped" contiennent `.` et `:` (ex: example.com:analytics)
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9.:-]*$").expect("static regex"))
}

impl TableRef {
    /// Parse `dataset.table` (projet par défaut requis) ou `project.dataset.table`
    pub fn parse(destination: &str, default_project: Option<&str>) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTable(destination.to_string());

        // rsplitn : le projet peut lui-même contenir des points
        let mut parts = destination.trim().rsplitn(3, '.');
        let table = parts.next().ok_or_else(invalid)?;
        let dataset = parts.next().ok_or_else(invalid)?;
        let project = match parts.next() {
            Some(project) => project,
            None => default_project
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ConfigError::MissingProject(destination.to_string()))?,
        };

        if !dataset_pattern().is_match(dataset)
            || !table_pattern().is_match(table)
            || !project_pattern().is_match(project)
        {
            return Err(invalid());
        }

        Ok(Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }

    /// Identifiant `dataset.table`, tel qu'affiché à l'utilisateur
    pub fn short(&self) -> String {
        format!("{}.{}", self.dataset, self.table)
    }

    /// Identifiant SQL entre backticks
    pub fn quoted(&self) -> String {
        format!("`{}`", self)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Configuration explicite passée à chaque pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Table destination, `dataset.table` ou `project.dataset.table`
    pub destination_table: String,

    /// Projet BigQuery (sinon `project_id` de la clé de service)
    pub project_id: Option<String>,

    /// Chemin de la clé JSON du compte de service
    pub credentials_path: Option<PathBuf>,

    /// Remplacement ou ajout
    pub write_mode: WriteMode,

    /// Ajouter les colonnes `longitude` / `latitude`
    pub add_coordinates: bool,

    /// Ajouter et remplir la colonne GEOGRAPHY (fichiers uniquement)
    pub add_geography: bool,

    /// CRS géographique des centroïdes et du GeoJSON chargé
    pub geographic_epsg: u32,

    /// CRS métrique utilisé pour le calcul des centroïdes
    pub metric_epsg: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            destination_table: String::new(),
            project_id: None,
            credentials_path: None,
            write_mode: WriteMode::Replace,
            add_coordinates: true,
            add_geography: true,
            geographic_epsg: WGS84_EPSG,
            metric_epsg: WEB_MERCATOR_EPSG,
        }
    }
}

impl PipelineConfig {
    /// Charge une configuration depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Complète la configuration depuis les variables d'environnement
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Variante de [`apply_env`](Self::apply_env) avec une source injectable
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(CREDENTIALS_ENV).filter(|v| !v.is_empty()) {
            self.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(project) = lookup(PROJECT_ENV).filter(|v| !v.is_empty()) {
            self.project_id = Some(project);
        }
    }

    /// Vérifie la présence de la destination et des credentials
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination_table.trim().is_empty() {
            return Err(ConfigError::MissingDestination);
        }
        if self.credentials_path.is_none() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(())
    }

    /// Résout la table destination ; `key_project` vient de la clé de service
    pub fn table_ref(&self, key_project: Option<&str>) -> Result<TableRef, ConfigError> {
        if self.destination_table.trim().is_empty() {
            return Err(ConfigError::MissingDestination);
        }
        TableRef::parse(
            &self.destination_table,
            self.project_id.as_deref().or(key_project),
        )
    }
}
