//! Point d'entrée CLI pour geo2bq

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Charger des couches SIG et des fichiers GeoJSON dans BigQuery
#[derive(Parser)]
#[command(name = "geo2bq")]
#[command(author, version)]
#[command(about = "Charger des couches SIG et des fichiers GeoJSON dans BigQuery")]
#[command(long_about = "Charge une couche nommée ou un fichier GeoJSON dans une table BigQuery.\n\nLes géométries des fichiers sont réparées, réduites en 2D, sérialisées en GeoJSON puis converties en colonne GEOGRAPHY native.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Layer {
            project_dir,
            layer,
            common,
        } => {
            info!(project_dir = %project_dir.display(), layer = %layer, "Chargement de couche");
            cli::cmd_layer(&project_dir, &layer, &common).await?;
        }
        Commands::File {
            input,
            no_geography,
            metric_epsg,
            common,
        } => {
            info!(input = %input.display(), "Chargement de fichier");
            cli::cmd_file(&input, no_geography, metric_epsg, &common).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
