use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlgraph::config::{CliConfig, TranslatorConfig};
use sqlgraph::graph_catalog::{SchemaCatalog, SchemaSnapshot};
use sqlgraph::metadata::MetadataProvider;
use sqlgraph::sql_translator::Translator;

/// sqlgraph - SQL over a Cypher graph database
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate one SQL statement and print the Cypher text
    Translate {
        /// The SQL statement to translate
        sql: String,

        #[command(flatten)]
        options: TranslateOptions,
    },

    /// List the tables of a schema snapshot
    Tables {
        /// Schema snapshot (YAML)
        #[arg(long)]
        schema: String,

        /// Table name pattern (`%` and `_` wildcards)
        #[arg(long)]
        pattern: Option<String>,

        /// Catalog name reported in the listing
        #[arg(long, default_value = "neo4j")]
        database: String,
    },
}

#[derive(Args, Debug)]
struct TranslateOptions {
    /// Schema snapshot (YAML); an empty schema is used when omitted
    #[arg(long)]
    schema: Option<String>,

    /// View definition document (path, file:, http: or https: URL)
    #[arg(long)]
    views: Option<String>,

    /// Table to label overrides, e.g. `Customers:Customer;Orders:Order`
    #[arg(long)]
    table_mapping: Option<String>,

    /// Join column mappings, e.g. `Orders.CustomerID:PURCHASED`
    #[arg(long)]
    join_column_mapping: Option<String>,

    /// Backtick every identifier, even plain ones
    #[arg(long)]
    always_escape: bool,

    /// One clause per line
    #[arg(long)]
    pretty: bool,

    /// Character introducing a named parameter
    #[arg(long, default_value_t = ':')]
    param_prefix: char,
}

impl From<TranslateOptions> for CliConfig {
    fn from(options: TranslateOptions) -> Self {
        CliConfig {
            view_definitions: options.views,
            table_mappings: options.table_mapping,
            join_column_mappings: options.join_column_mapping,
            sample_size: 1000,
            always_escape: options.always_escape,
            pretty: options.pretty,
            param_prefix: options.param_prefix,
            database: "neo4j".to_string(),
        }
    }
}

fn load_snapshot(path: Option<&str>) -> anyhow::Result<SchemaSnapshot> {
    match path {
        Some(path) => SchemaSnapshot::from_yaml_file(path)
            .with_context(|| format!("Failed to load schema snapshot {}", path)),
        None => Ok(SchemaSnapshot::empty()),
    }
}

async fn translate(sql: &str, options: TranslateOptions) -> anyhow::Result<()> {
    let snapshot = load_snapshot(options.schema.as_deref())?;
    let config = TranslatorConfig::from_cli(options.into()).context("Configuration error")?;
    let catalog = SchemaCatalog::from_snapshot(snapshot, config.catalog_settings());
    if let Some(location) = &config.view_definitions {
        let count = catalog
            .load_views(location)
            .await
            .with_context(|| format!("Failed to load views from {}", location))?;
        log::info!("Loaded {} view definitions from {}", count, location);
    }

    let compiled = Translator::new(&config).translate(sql, &catalog.current())?;
    println!("{}", compiled.cypher);
    Ok(())
}

fn tables(schema: &str, pattern: Option<&str>, database: String) -> anyhow::Result<()> {
    let snapshot = load_snapshot(Some(schema))?;
    let catalog = SchemaCatalog::from_snapshot(snapshot, Default::default());
    let listing = MetadataProvider::new(Arc::new(catalog), database).get_tables(None, None, pattern, None)?;
    for row in &listing.rows {
        println!("{}\t{}", listing.value(row, "TABLE_NAME"), listing.value(row, "TABLE_TYPE"));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Translate { sql, options } => translate(&sql, options).await,
        Commands::Tables {
            schema,
            pattern,
            database,
        } => tables(&schema, pattern.as_deref(), database),
    }
}
