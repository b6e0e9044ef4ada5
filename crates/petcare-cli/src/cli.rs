use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "petcare",
    about = "PetCare API server and JSON document store tools",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Directory holding the collection files
    #[arg(long, global = true, env = "PETCARE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, env = "PETCARE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Insert a document
    Insert(InsertArgs),
    /// List documents matching a query
    Find(FindArgs),
    /// Show one document by id
    Get(GetArgs),
    /// Update the first document matching a query
    Update(UpdateArgs),
    /// Delete the first document matching a query
    Delete(DeleteArgs),
    /// List the distinct values of a field
    Distinct(DistinctArgs),
    /// Count documents matching a query
    Count(CountArgs),
    /// List collections on disk
    Collections,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    #[arg(long)]
    pub uploads_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct InsertArgs {
    pub collection: String,
    /// Document as a JSON object
    pub document: String,
}

#[derive(Args)]
pub struct FindArgs {
    pub collection: String,
    /// Equality query as a JSON object
    #[arg(short, long)]
    pub query: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub collection: String,
    pub id: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub collection: String,
    pub query: String,
    /// `{"$set": {...}}`, `{"$inc": {...}}`, or fields to merge
    pub update: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub collection: String,
    pub query: String,
}

#[derive(Args)]
pub struct DistinctArgs {
    pub collection: String,
    pub field: String,
}

#[derive(Args)]
pub struct CountArgs {
    pub collection: String,
    #[arg(short, long)]
    pub query: Option<String>,
}
