//! Strata CLI - plan fetches, project records and convert values
//!
//! Usage:
//!   strata validate --schema <schema.toml>
//!   strata plan <object> [--select <path>]... [--schema <schema.toml>]
//!   strata project <object> <record.json> [--select <path>]... [--stage api|server]
//!   strata convert <type> <value> [--input parameter|json|database]
//!
//! Examples:
//!   strata plan Widget --select id --select owner.name
//!   strata project Widget widget.json --select createdAt --version 4 --timezone Europe/Paris
//!   strata convert "array<integer, 1>" "1,2,3"

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value as Json;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use strata::config::Settings;
use strata::context::{parse_timezone, ApiVersion, ConversionContext};
use strata::projection::{record_to_json, DerivedFields, RecordProjector};
use strata::schema::Schema;
use strata::selection::SelectionSet;
use strata::types::{CatalogBuilder, DataTypeCatalog, ServerValue};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata - typed value conversion and selection planning")]
#[command(version)]
struct Cli {
    /// Path to strata.toml (defaults to STRATA_CONFIG, ./strata.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a schema
    Validate {
        /// Path to the schema file (defaults to schema.path in the config)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Print the fetch plan for a selection
    Plan {
        /// Object type to select from
        object: String,

        /// Dotted selection path; selects every field when omitted
        #[arg(long = "select")]
        select: Vec<String>,

        /// Path to the schema file (defaults to schema.path in the config)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Root table alias (defaults to planner.root_alias in the config)
        #[arg(long)]
        alias: Option<String>,
    },

    /// Project a raw JSON record through a selection
    Project {
        /// Object type of the record
        object: String,

        /// Path to the raw record, or "-" for stdin
        record: PathBuf,

        /// Dotted selection path; selects every field when omitted
        #[arg(long = "select")]
        select: Vec<String>,

        /// Path to the schema file (defaults to schema.path in the config)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output stage
        #[arg(long, default_value = "api")]
        stage: StageArg,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Validate and convert a single value
    Convert {
        /// Type name or expression, e.g. "datetime" or "one_of<integer>"
        data_type: String,

        /// Value to convert
        value: String,

        /// How to read the value
        #[arg(short, long, default_value = "parameter")]
        input: InputArg,

        /// Schema providing enums and polymorphic types
        #[arg(short, long)]
        schema: Option<PathBuf>,

        #[command(flatten)]
        context: ContextArgs,
    },
}

#[derive(clap::Args)]
struct ContextArgs {
    /// API version (defaults to context.default_version in the config)
    #[arg(long)]
    version: Option<u32>,

    /// IANA timezone (defaults to context.default_timezone in the config)
    #[arg(long)]
    timezone: Option<String>,
}

#[derive(Clone, ValueEnum)]
enum StageArg {
    /// Formatted API values
    Api,
    /// Canonical server values
    Server,
}

#[derive(Clone, ValueEnum)]
enum InputArg {
    /// A string parameter
    Parameter,
    /// A JSON value
    Json,
    /// A stored value, as JSON
    Database,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()).and_then(|s| {
        s.validate()?;
        Ok(s)
    }) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings.logging.level);

    let result = match cli.command {
        Commands::Validate { schema } => cmd_validate(&settings, schema),
        Commands::Plan {
            object,
            select,
            schema,
            alias,
        } => cmd_plan(&settings, schema, &object, &select, alias),
        Commands::Project {
            object,
            record,
            select,
            schema,
            stage,
            context,
        } => cmd_project(&settings, schema, &object, &record, &select, stage, context),
        Commands::Convert {
            data_type,
            value,
            input,
            schema,
            context,
        } => cmd_convert(&settings, schema, &data_type, &value, input, context),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_schema(
    settings: &Settings,
    schema: Option<PathBuf>,
) -> CliResult<(Schema, DataTypeCatalog)> {
    let path = match schema {
        Some(path) => path,
        None => settings
            .schema
            .resolved_path()?
            .ok_or("no schema given; pass --schema or set schema.path")?,
    };
    let source = fs::read_to_string(&path)
        .map_err(|e| format!("cannot read schema '{}': {}", path.display(), e))?;
    Ok(Schema::load_validated(&source)?)
}

fn build_selection(
    schema: &Schema,
    object: &str,
    select: &[String],
) -> CliResult<SelectionSet> {
    if select.is_empty() {
        Ok(SelectionSet::all_fields(schema, object)?)
    } else {
        Ok(SelectionSet::build(schema, object, select)?)
    }
}

fn build_context(settings: &Settings, args: ContextArgs) -> CliResult<ConversionContext> {
    let defaults = settings.context.default_context()?;
    let version = match args.version {
        Some(v) => ApiVersion::new(v)?,
        None => defaults.version(),
    };
    let timezone = match args.timezone {
        Some(id) => parse_timezone(&id)?,
        None => defaults.timezone(),
    };
    Ok(ConversionContext::new(version, timezone))
}

fn read_input(path: &Path) -> io::Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        fs::read_to_string(path)
    }
}

fn cmd_validate(settings: &Settings, schema: Option<PathBuf>) -> CliResult<()> {
    let (schema, catalog) = load_schema(settings, schema)?;
    println!(
        "OK: {} object types, {} representations, {} types",
        schema.objects.len(),
        schema.representations.len(),
        catalog.names().len()
    );
    Ok(())
}

fn cmd_plan(
    settings: &Settings,
    schema: Option<PathBuf>,
    object: &str,
    select: &[String],
    alias: Option<String>,
) -> CliResult<()> {
    let (schema, _) = load_schema(settings, schema)?;
    let selections = build_selection(&schema, object, select)?;
    let alias = alias.unwrap_or_else(|| settings.planner.root_alias.clone());
    let plan = selections.fetch_plan(&alias, settings.planner.alias_options())?;
    println!("{}", plan);
    Ok(())
}

fn cmd_project(
    settings: &Settings,
    schema: Option<PathBuf>,
    object: &str,
    record: &Path,
    select: &[String],
    stage: StageArg,
    context: ContextArgs,
) -> CliResult<()> {
    let (schema, catalog) = load_schema(settings, schema)?;
    let selections = build_selection(&schema, object, select)?;
    let ctx = build_context(settings, context)?;

    let source = read_input(record)?;
    let raw: Json = serde_json::from_str(&source)?;
    let raw = raw.as_object().ok_or("the record must be a JSON object")?;

    let derived = DerivedFields::new();
    let projector = RecordProjector::new(&catalog, &derived);
    match stage {
        StageArg::Api => {
            let projected = projector.project_api(&selections, raw, None, &ctx)?;
            let json = record_to_json(&projected);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        StageArg::Server => {
            let projected = projector.project_server(&selections, raw, None)?;
            println!("{:#?}", projected);
        }
    }
    Ok(())
}

fn cmd_convert(
    settings: &Settings,
    schema: Option<PathBuf>,
    data_type: &str,
    value: &str,
    input: InputArg,
    context: ContextArgs,
) -> CliResult<()> {
    let mut builder = match schema.or(settings.schema.resolved_path()?) {
        Some(path) => load_schema(settings, Some(path))?.0.catalog_builder()?,
        None => CatalogBuilder::new(),
    };
    builder.declare(data_type)?;
    let catalog = builder.build()?;
    let ctx = build_context(settings, context)?;
    let data_type = catalog.get(data_type)?;

    let server: ServerValue = match input {
        InputArg::Parameter => {
            data_type.validate_user_parameter_value(value, &ctx)?;
            data_type.convert_user_parameter_value_to_server_value(value, &ctx)?
        }
        InputArg::Json => {
            let json = parse_json(value)?;
            data_type.validate_user_json_value(&json, &ctx)?;
            data_type.convert_user_json_value_to_server_value(&json, &ctx)?
        }
        InputArg::Database => {
            let json = parse_json(value)?;
            data_type.convert_database_value_to_server_value(&json)?
        }
    };

    let api = data_type.convert_server_value_to_api_value(&server, &ctx)?;
    let stored = data_type.convert_server_value_to_database_value(&server)?;
    println!("server:   {:?}", server);
    println!("api:      {}", api);
    println!("database: {}", stored);
    Ok(())
}

fn parse_json(value: &str) -> CliResult<Json> {
    serde_json::from_str(value).map_err(|e| format!("invalid JSON value: {}", e).into())
}
