#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use octofhir_fhirschema_defaults::*;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};
#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "fhir-defaults")]
#[command(about = "Apply FHIR profile default values to resources")]
#[command(version)]
struct Cli {
    /// Log traversal details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Apply a schema's defaults to a record
    Apply {
        /// Path to the record (JSON)
        #[arg(short, long)]
        record: PathBuf,
        /// Path to the TypeSchema file
        #[arg(short, long, conflicts_with = "profile")]
        schema: Option<PathBuf>,
        /// Profile URL to look up in the schema directory
        #[arg(short, long, requires = "schema_dir")]
        profile: Option<String>,
        /// Directory of TypeSchema files
        #[arg(long)]
        schema_dir: Option<PathBuf>,
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the crawl order of a schema
    Inspect {
        /// Path to the TypeSchema file
        #[arg(short, long)]
        schema: PathBuf,
    },
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Apply {
            record,
            schema,
            profile,
            schema_dir,
            config,
            output,
        } => {
            apply(
                &record,
                schema.as_deref(),
                profile.as_deref(),
                schema_dir,
                config.as_deref(),
                output.as_deref(),
            )
            .await?;
        }
        Commands::Inspect { schema } => {
            inspect(&schema).await?;
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(feature = "cli")]
async fn apply(
    record_path: &Path,
    schema_path: Option<&Path>,
    profile: Option<&str>,
    schema_dir: Option<PathBuf>,
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => DefaultsConfig::from_json_file(path).await?,
        None => DefaultsConfig::default(),
    };
    if let Some(dir) = schema_dir {
        config.schema_dir = Some(dir);
    }

    let record: serde_json::Value = read_json(record_path).await?;

    let result = match (schema_path, profile) {
        (Some(path), _) => {
            let schema: TypeSchema = read_json(path).await?;
            schema.validate_structure()?;
            if config.schema_dir.is_some() {
                let manager = DefaultsManager::from_config(config).await?;
                manager.apply_schema(&record, &schema).await?
            } else {
                apply_default_values_with(&record, &schema, None, config.apply_options())?
            }
        }
        (None, Some(url)) => {
            let manager = DefaultsManager::from_config(config).await?;
            manager.apply(&record, url).await?
        }
        (None, None) => return Err("either --schema or --profile is required".into()),
    };

    let rendered = serde_json::to_string_pretty(&result)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, rendered).await?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

#[cfg(feature = "cli")]
async fn inspect(schema_path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let schema: TypeSchema = read_json(schema_path).await?;
    schema.validate_structure()?;

    println!("{schema}");
    println!("Elements: {}", schema.elements.len());
    for profile in schema.referenced_profiles() {
        println!("  references {profile}");
    }
    println!();

    let mut recorder = EventRecorder::new();
    SchemaCrawler::new(&schema).crawl(&mut recorder)?;
    for event in &recorder.events {
        println!("{event}");
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Please compile with --features cli");
    std::process::exit(1);
}
