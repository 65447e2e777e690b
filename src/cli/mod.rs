pub mod commands;
pub mod session;
pub mod utils;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::request::IndexParams;
use crate::types::{SortDirection, TrashedStatus};

#[derive(Parser)]
#[command(name = "resource-admin")]
#[command(about = "Inspect declarative admin resources against fixture data")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where resources and records come from, and who is asking
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[arg(long, global = true, help = "Resource schema file (YAML or JSON); defaults to $RESOURCE_SCHEMA")]
    pub schema: Option<PathBuf>,

    #[arg(long, global = true, help = "Fixture data file: {\"table\": [rows]}")]
    pub data: Option<PathBuf>,

    #[arg(long, global = true, default_value = "cli", help = "Actor id")]
    pub actor: String,

    #[arg(long = "role", global = true, help = "Actor role (repeatable)")]
    pub roles: Vec<String>,
}

/// Listing parameters shared by `index` and `sql`
#[derive(Args, Debug, Clone, Default)]
pub struct ListingArgs {
    #[arg(help = "Resource key")]
    pub resource: String,

    #[arg(long, help = "Search term")]
    pub search: Option<String>,

    #[arg(long, help = "Encoded filter parameter (base64 JSON)")]
    pub filter: Option<String>,

    #[arg(long = "where", help = "Filter entry as key=json-value (repeatable)")]
    pub filter_entries: Vec<String>,

    #[arg(long, help = "Sort column")]
    pub order: Option<String>,

    #[arg(long, help = "Sort direction (asc|desc)")]
    pub direction: Option<String>,

    #[arg(long, help = "Soft-deleted records (with|only)")]
    pub trashed: Option<String>,

    #[arg(long, help = "Page size")]
    pub per_page: Option<u64>,

    #[arg(long, default_value_t = 1, help = "Page number")]
    pub page: u64,

    #[arg(long, help = "Lens key")]
    pub lens: Option<String>,

    #[arg(long, help = "Parent relationship as resource:id:relationship")]
    pub via: Option<String>,
}

impl ListingArgs {
    pub fn params(&self, filters: Option<String>) -> IndexParams {
        IndexParams {
            search: self.search.clone(),
            filters,
            order_by: self.order.clone(),
            direction: self.direction.as_deref().map(SortDirection::parse),
            trashed: self.trashed.as_deref().map(TrashedStatus::parse).unwrap_or_default(),
            per_page: self.per_page,
            page: self.page.max(1),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show resolved fields and panels of a resource")]
    Describe(commands::describe::DescribeArgs),

    #[command(about = "List records the way the index view would")]
    Index(ListingArgs),

    #[command(about = "Print the SQL for a listing")]
    Sql(ListingArgs),

    #[command(about = "Show validation rules for a form")]
    Rules(commands::rules::RulesArgs),

    #[command(about = "List the filters available to the actor")]
    Filters {
        #[arg(help = "Resource key")]
        resource: String,

        #[arg(long, help = "Lens key")]
        lens: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let session = session::Session::open(&cli.source)?;

    match cli.command {
        Commands::Describe(args) => commands::describe::handle(&session, args, output_format),
        Commands::Index(args) => commands::listing::handle_index(&session, args, output_format),
        Commands::Sql(args) => commands::listing::handle_sql(&session, args, output_format),
        Commands::Rules(args) => commands::rules::handle(&session, args, output_format),
        Commands::Filters { resource, lens } => {
            commands::filters::handle(&session, resource, lens, output_format)
        }
    }
}
