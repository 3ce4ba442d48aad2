//! Définition et implémentation des commandes CLI
//!
//! - `layer` : couche nommée d'un projet -> table BigQuery
//! - `file` : fichier GeoJSON -> table BigQuery + colonne GEOGRAPHY

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use geo2bq::config::{PipelineConfig, WriteMode};
use geo2bq::layer::Project;
use geo2bq::pipeline::{
    file_to_table, layer_to_table, prepare_file_dataset, prepare_layer_dataset,
};
use geo2bq::report::LoadReport;
use geo2bq::warehouse::{BigQueryClient, LoadStage};

/// URL de l'API BigQuery (émulateur local par exemple)
const BASE_URL_ENV: &str = "GEO2BQ_BIGQUERY_URL";

#[derive(Subcommand)]
pub enum Commands {
    /// Load a named layer of a project directory into a BigQuery table
    Layer {
        /// Directory of GeoJSON layers (one layer per file, named after the file stem)
        #[arg(long)]
        project_dir: PathBuf,

        /// Layer name
        #[arg(short, long)]
        layer: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Load a GeoJSON file into a BigQuery table with a GEOGRAPHY column
    File {
        /// Input GeoJSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Skip the GEOGRAPHY column (only upload geometry_geojson text)
        #[arg(long)]
        no_geography: bool,

        /// Metric EPSG used for centroids (default: 3857 / Web Mercator)
        #[arg(long)]
        metric_epsg: Option<u32>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Options communes aux deux commandes
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Destination table (dataset.table or project.dataset.table)
    #[arg(short, long)]
    pub table: Option<String>,

    /// JSON config file (values are overridden by env and flags)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Service account key (défaut : env GOOGLE_APPLICATION_CREDENTIALS)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// BigQuery project (défaut : env GEO2BQ_PROJECT / project_id de la clé)
    #[arg(long)]
    pub project: Option<String>,

    /// Write mode: replace or append
    #[arg(long)]
    pub mode: Option<WriteMode>,

    /// Do not add longitude/latitude columns
    #[arg(long)]
    pub no_coordinates: bool,

    /// Prepare the dataset and print the report without uploading
    #[arg(long)]
    pub dry_run: bool,

    /// Save the load report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl CommonArgs {
    /// Défauts, puis fichier, puis environnement, puis options
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        config.apply_env();

        if let Some(table) = &self.table {
            config.destination_table = table.clone();
        }
        if let Some(credentials) = &self.credentials {
            config.credentials_path = Some(credentials.clone());
        }
        if let Some(project) = &self.project {
            config.project_id = Some(project.clone());
        }
        if let Some(mode) = self.mode {
            config.write_mode = mode;
        }
        if self.no_coordinates {
            config.add_coordinates = false;
        }

        Ok(config)
    }
}

/// Ouvre le client BigQuery ; complète le projet depuis la clé si besoin
fn connect(config: &mut PipelineConfig) -> Result<BigQueryClient> {
    config.validate()?;

    let credentials = config
        .credentials_path
        .clone()
        .context("Missing credentials path")?;
    let mut client =
        BigQueryClient::from_credentials_file(&credentials, config.project_id.as_deref())
            .with_context(|| format!("Failed to load credentials {}", credentials.display()))?;

    if config.project_id.is_none() {
        config.project_id = Some(client.project_id().to_string());
    }
    if let Ok(url) = std::env::var(BASE_URL_ENV) {
        client = client.with_base_url(url);
    }

    info!(client = %client, "BigQuery client ready");
    Ok(client)
}

fn finish(report: &LoadReport, report_path: Option<&Path>) -> Result<()> {
    if let Some(path) = report_path {
        report.save_to_file(path)?;
        info!(path = %path.display(), "Report saved");
    }
    info!("{}", report.summary());
    Ok(())
}

pub async fn cmd_layer(project_dir: &Path, layer_name: &str, common: &CommonArgs) -> Result<()> {
    let mut config = common.resolve()?;

    let project = Project::load_dir(project_dir)?;
    let layer = project.map_layer_by_name(layer_name)?;

    if common.dry_run {
        let prepared = prepare_layer_dataset(layer, &config)?;
        let report = prepared.report(layer_name, &config.destination_table, &config);
        report.display();
        return finish(&report, common.report.as_deref());
    }

    let client = connect(&mut config)?;
    let report = layer_to_table(layer, &config, &client).await?;

    println!(
        "✅ Uploaded {} rows to BigQuery table `{}`.",
        report.rows, report.table
    );
    finish(&report, common.report.as_deref())
}

pub async fn cmd_file(
    input: &Path,
    no_geography: bool,
    metric_epsg: Option<u32>,
    common: &CommonArgs,
) -> Result<()> {
    let mut config = common.resolve()?;
    if no_geography {
        config.add_geography = false;
    }
    if let Some(epsg) = metric_epsg {
        config.metric_epsg = epsg;
    }

    if common.dry_run {
        let prepared = prepare_file_dataset(input, &config)?;
        let report = prepared.report(
            &input.display().to_string(),
            &config.destination_table,
            &config,
        );
        report.display();
        return finish(&report, common.report.as_deref());
    }

    let client = connect(&mut config)?;
    let report = file_to_table(input, &config, &client).await?;

    println!(
        "✅ Uploaded {} rows to BigQuery table `{}`.",
        report.rows, report.table
    );
    if report.geography_stage == Some(LoadStage::GeographyPopulated) {
        println!("✅ GEOGRAPHY column added and populated.");
    }
    finish(&report, common.report.as_deref())
}
