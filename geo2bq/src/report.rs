//! Rapport de chargement
//!
//! Collecte ce qui a été préparé et écrit pendant un chargement, pour
//! l'affichage console et l'export JSON (`--report`).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::WriteMode;
use crate::table::Field;
use crate::warehouse::{BackfillOutcome, LoadStage};

/// Statut du chargement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadStatus {
    /// Données préparées, rien n'a été envoyé
    DryRun,
    /// Table écrite (et colonne GEOGRAPHY remplie si demandée)
    Success,
}

/// Rapport complet d'un chargement
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// Fichier ou couche source
    pub source: String,
    /// Table destination (`dataset.table`)
    pub table: String,
    /// Politique d'écriture
    pub mode: WriteMode,
    /// Statut final
    pub status: LoadStatus,
    /// Durée du chargement
    pub duration_secs: f64,

    /// Nombre de lignes préparées
    pub rows: usize,
    /// Nombre de lignes écrites selon l'entrepôt
    pub rows_written: Option<u64>,
    /// Schéma envoyé
    pub schema: Vec<Field>,

    /// Géométries invalides réparées avant sérialisation
    pub geometries_repaired: usize,
    /// Features sans géométrie
    pub features_without_geometry: usize,

    /// Dernière étape terminée du chargement GEOGRAPHY
    pub geography_stage: Option<LoadStage>,
    /// Lignes mises à jour par le remplissage GEOGRAPHY
    pub rows_populated: Option<u64>,
}

impl LoadReport {
    pub fn new(source: &str, table: &str, mode: WriteMode) -> Self {
        Self {
            source: source.to_string(),
            table: table.to_string(),
            mode,
            status: LoadStatus::DryRun,
            duration_secs: 0.0,
            rows: 0,
            rows_written: None,
            schema: Vec::new(),
            geometries_repaired: 0,
            features_without_geometry: 0,
            geography_stage: None,
            rows_populated: None,
        }
    }

    /// Enregistre l'écriture simple de la table
    pub fn record_write(&mut self, rows_written: u64) {
        self.rows_written = Some(rows_written);
        self.status = LoadStatus::Success;
    }

    /// Enregistre un chargement complet avec colonne GEOGRAPHY
    pub fn record_backfill(&mut self, outcome: &BackfillOutcome) {
        self.rows_written = Some(outcome.rows_written);
        self.rows_populated = outcome.rows_populated;
        self.geography_stage = Some(outcome.stage);
        self.status = LoadStatus::Success;
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("LOAD REPORT - {}", self.table);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Source: {}", self.source);
        println!("Mode: {}", self.mode);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Rows: {} prepared, {} written",
            self.rows,
            self.rows_written
                .map_or_else(|| "-".to_string(), |n| n.to_string())
        );
        println!(
            "Geometries: {} repaired, {} missing",
            self.geometries_repaired, self.features_without_geometry
        );
        if let Some(stage) = self.geography_stage {
            println!("Geography: {}", stage);
        }

        if !self.schema.is_empty() {
            println!("\n--- SCHEMA ---");
            for field in &self.schema {
                println!("  {}: {}", field.name, field.column_type.as_str());
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} rows, {} repaired, {} without geometry",
            self.table, self.rows, self.geometries_repaired, self.features_without_geometry
        )
    }
}
