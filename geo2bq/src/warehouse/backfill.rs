//! Chargement en trois étapes avec colonne GEOGRAPHY
//!
//! 1. écriture de la table (sans géométrie, avec `geometry_geojson`)
//! 2. `ALTER TABLE ... ADD COLUMN IF NOT EXISTS geometry GEOGRAPHY`
//! 3. `UPDATE ... SET geometry = ST_GEOGFROMGEOJSON(geometry_geojson) WHERE TRUE`
//!
//! Aucune étape n'est annulée en cas d'échec : la table reste dans l'état de
//! la dernière étape terminée, rapportée par [`BackfillError::completed`].
//! Les étapes 2 et 3 sont idempotentes et peuvent être rejouées.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use super::{Warehouse, WarehouseError};
use crate::config::{TableRef, WriteMode};
use crate::table::Dataset;

/// Colonne GEOGRAPHY créée dans la table
pub const GEOGRAPHY_COLUMN: &str = "geometry";

/// Colonne texte source du GeoJSON
pub const GEOJSON_COLUMN: &str = "geometry_geojson";

/// Dernière étape terminée d'un chargement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LoadStage {
    /// Rien n'a été écrit
    Nothing,
    /// Table écrite, sans colonne GEOGRAPHY
    TableWritten,
    /// Colonne GEOGRAPHY présente mais vide
    GeographyColumnAdded,
    /// Colonne GEOGRAPHY remplie
    GeographyPopulated,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStage::Nothing => "nothing",
            LoadStage::TableWritten => "table written",
            LoadStage::GeographyColumnAdded => "geography column added",
            LoadStage::GeographyPopulated => "geography populated",
        };
        f.write_str(name)
    }
}

/// Échec d'une étape, avec la dernière étape terminée
#[derive(Debug, Error)]
#[error("Geography load failed (last completed stage: {completed}): {source}")]
pub struct BackfillError {
    pub completed: LoadStage,
    #[source]
    pub source: WarehouseError,
}

/// Résultat d'un chargement complet
#[derive(Debug, Clone, Serialize)]
pub struct BackfillOutcome {
    pub rows_written: u64,
    pub rows_populated: Option<u64>,
    pub stage: LoadStage,
}

/// `ALTER TABLE` ajoutant la colonne GEOGRAPHY
pub fn add_geography_column_sql(table: &TableRef) -> String {
    format!(
        "ALTER TABLE {}\nADD COLUMN IF NOT EXISTS {} GEOGRAPHY;",
        table.quoted(),
        GEOGRAPHY_COLUMN
    )
}

/// `UPDATE` remplissant la colonne GEOGRAPHY depuis le texte GeoJSON
pub fn populate_geography_sql(table: &TableRef) -> String {
    format!(
        "UPDATE {}\nSET {} = ST_GEOGFROMGEOJSON({})\nWHERE TRUE;",
        table.quoted(),
        GEOGRAPHY_COLUMN,
        GEOJSON_COLUMN
    )
}

/// Suivi des étapes d'un chargement sur une table
pub struct GeographyLoad<'a, W: Warehouse + ?Sized> {
    warehouse: &'a W,
    table: &'a TableRef,
    stage: LoadStage,
}

impl<'a, W: Warehouse + ?Sized> GeographyLoad<'a, W> {
    pub fn new(warehouse: &'a W, table: &'a TableRef) -> Self {
        Self {
            warehouse,
            table,
            stage: LoadStage::Nothing,
        }
    }

    /// Dernière étape terminée
    pub fn stage(&self) -> LoadStage {
        self.stage
    }

    /// Étape 1 : écrit la table
    pub async fn write_table(&mut self, dataset: &Dataset, mode: WriteMode) -> Result<u64, BackfillError> {
        let rows = self
            .warehouse
            .write_table(self.table, dataset, mode)
            .await
            .map_err(|e| self.fail(e))?;
        self.stage = LoadStage::TableWritten;
        Ok(rows)
    }

    /// Étape 2 : ajoute la colonne GEOGRAPHY
    pub async fn add_geography_column(&mut self) -> Result<(), BackfillError> {
        self.warehouse
            .execute(&add_geography_column_sql(self.table))
            .await
            .map_err(|e| self.fail(e))?;
        self.stage = LoadStage::GeographyColumnAdded;
        info!(table = %self.table, column = GEOGRAPHY_COLUMN, "GEOGRAPHY column added");
        Ok(())
    }

    /// Étape 3 : remplit la colonne depuis `geometry_geojson`
    pub async fn populate_geography(&mut self) -> Result<Option<u64>, BackfillError> {
        let affected = self
            .warehouse
            .execute(&populate_geography_sql(self.table))
            .await
            .map_err(|e| self.fail(e))?;
        self.stage = LoadStage::GeographyPopulated;
        info!(table = %self.table, rows = ?affected, "GEOGRAPHY column populated");
        Ok(affected)
    }

    fn fail(&self, source: WarehouseError) -> BackfillError {
        error!(
            table = %self.table,
            completed = %self.stage,
            error = %source,
            "Geography load step failed, table left in last completed stage"
        );
        BackfillError {
            completed: self.stage,
            source,
        }
    }
}

/// Enchaîne les trois étapes sur une table
pub async fn run_backfill<W: Warehouse + ?Sized>(
    warehouse: &W,
    table: &TableRef,
    dataset: &Dataset,
    mode: WriteMode,
) -> Result<BackfillOutcome, BackfillError> {
    let mut load = GeographyLoad::new(warehouse, table);

    let rows_written = load.write_table(dataset, mode).await?;
    load.add_geography_column().await?;
    let rows_populated = load.populate_geography().await?;

    Ok(BackfillOutcome {
        rows_written,
        rows_populated,
        stage: load.stage(),
    })
}
