//! surveyor CLI entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use surveyor::cli::{Cli, Commands, OutputFormat};
use surveyor::config::{Config, LogFormat, StorageKind};
use surveyor::output::{format_output, pretty};
use surveyor::schema::InMemorySchemaBridge;
use surveyor::storage::InMemoryRepository;
use surveyor::{demo, VersioningEngine};
use surveyor_core::survey::Survey;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    init_tracing(config.log_format);

    let storage = cli.storage.unwrap_or(config.storage);
    tracing::debug!(%storage, "Using storage backend");
    let engine = build_engine(storage, &config).await?;

    match cli.command {
        Commands::Create { file } => {
            let survey = read_survey(&file)?;
            let created = engine.create(survey).await?;
            print_survey("Created", &created, cli.format);
        }
        Commands::Update { study, file } => {
            let survey = read_survey(&file)?;
            let updated = engine.update(&study, survey).await?;
            print_survey("Updated", &updated, cli.format);
        }
        Commands::Publish {
            revision,
            new_schema_revision,
            lock_version,
        } => {
            let mut survey = engine
                .get_survey(&revision.study, revision.keys(), false)
                .await?;
            if lock_version.is_some() {
                survey.version = lock_version;
            }
            let published = engine
                .publish(&revision.study, &survey, new_schema_revision)
                .await?;
            print_survey("Published", &published, cli.format);
        }
        Commands::Branch { revision } => {
            let branched = engine
                .version_survey(&revision.study, revision.keys())
                .await?;
            print_survey("Branched", &branched, cli.format);
        }
        Commands::Delete {
            revision,
            lock_version,
        } => {
            let mut survey = engine
                .get_survey(&revision.study, revision.keys(), false)
                .await?;
            if lock_version.is_some() {
                survey.version = lock_version;
            }
            let deleted = engine.delete(&survey).await?;
            print_survey("Deleted", &deleted, cli.format);
        }
        Commands::Purge { revision } => {
            engine
                .delete_survey_permanently(&revision.study, revision.keys())
                .await?;
            if !cli.quiet {
                println!("Purged survey {}", revision.keys());
            }
        }
        Commands::Get {
            revision,
            no_elements,
        } => {
            let survey = engine
                .get_survey(&revision.study, revision.keys(), !no_elements)
                .await?;
            print_survey("", &survey, cli.format);
        }
        Commands::Latest { survey, published } => {
            let latest = if published {
                engine
                    .get_survey_most_recently_published_version(&survey.study, survey.guid, true)
                    .await?
            } else {
                engine
                    .get_survey_most_recent_version(&survey.study, survey.guid)
                    .await?
            };
            print_survey("", &latest, cli.format);
        }
        Commands::Versions {
            survey,
            include_deleted,
        } => {
            let versions = engine
                .get_survey_all_versions(&survey.study, survey.guid, include_deleted)
                .await?;
            print_surveys(&versions, cli.format);
        }
        Commands::Lookup {
            study,
            identifier,
            include_deleted,
        } => {
            let guid = if include_deleted {
                engine
                    .admin_get_survey_guid_for_identifier(&study, &identifier)
                    .await?
            } else {
                engine
                    .get_survey_guid_for_identifier(&study, &identifier)
                    .await?
            };
            match cli.format {
                OutputFormat::Json => println!("{}", format_output(&guid, cli.format)),
                OutputFormat::Pretty => println!("{} -> {}", identifier, guid),
            }
        }
        Commands::List { study, published } => {
            let surveys = if published {
                engine
                    .get_all_surveys_most_recently_published_version(&study)
                    .await?
            } else {
                engine.get_all_surveys_most_recent_version(&study).await?
            };
            print_surveys(&surveys, cli.format);
        }
        Commands::Demo { study } => {
            let steps = demo::run(&engine, &study).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", format_output(&steps, cli.format)),
                OutputFormat::Pretty => println!("{}", pretty::format_demo(&steps)),
            }
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber, logging to stderr.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "surveyor=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// Build the engine on top of the selected storage backend.
///
/// Upload schemas are tracked in memory for every backend, so schema
/// revisions only persist for the lifetime of the process.
#[cfg_attr(
    not(any(feature = "sqlite", feature = "dynamodb")),
    allow(unused_variables)
)]
async fn build_engine(storage: StorageKind, config: &Config) -> Result<VersioningEngine> {
    let schemas = Arc::new(InMemorySchemaBridge::new());

    match storage {
        StorageKind::Memory => {
            let repo = Arc::new(InMemoryRepository::new());
            Ok(VersioningEngine::new(repo.clone(), repo, schemas))
        }
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => {
            let repo = Arc::new(
                surveyor::storage::SqliteRepository::new(&config.sqlite_path)
                    .await
                    .with_context(|| format!("opening SQLite database {}", config.sqlite_path))?,
            );
            tracing::info!(path = %config.sqlite_path, "SQLite storage ready");
            Ok(VersioningEngine::new(repo.clone(), repo, schemas))
        }
        #[cfg(feature = "dynamodb")]
        StorageKind::Dynamodb => {
            let repo = Arc::new(
                surveyor::storage::DynamoDbRepository::connect(&config.dynamodb_table_name).await,
            );
            tracing::info!(table = %repo.table_name(), "DynamoDB storage ready");
            Ok(VersioningEngine::new(repo.clone(), repo, schemas))
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!(
            "storage backend '{other}' is not compiled in; rebuild with --features {other}"
        ),
    }
}

fn read_survey(path: &std::path::Path) -> Result<Survey> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn print_survey(label: &str, survey: &Survey, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", format_output(survey, format)),
        OutputFormat::Pretty if label.is_empty() => println!("{}", pretty::format_survey(survey)),
        OutputFormat::Pretty => println!("{}:\n{}", label, pretty::format_survey(survey)),
    }
}

fn print_surveys(surveys: &[Survey], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", format_output(&surveys, format)),
        OutputFormat::Pretty => println!("{}", pretty::format_surveys(surveys)),
    }
}
