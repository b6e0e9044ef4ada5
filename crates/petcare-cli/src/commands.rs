use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use petcare_server::{PetcareServer, ServerConfig};
use petcare_store::{Document, Query, Repository, Update};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Insert(args) => cmd_insert(&open(&config).await?, args, format).await,
        Command::Find(args) => cmd_find(&open(&config).await?, args, format).await,
        Command::Get(args) => cmd_get(&open(&config).await?, args, format).await,
        Command::Update(args) => cmd_update(&open(&config).await?, args, format).await,
        Command::Delete(args) => cmd_delete(&open(&config).await?, args, format).await,
        Command::Distinct(args) => cmd_distinct(&open(&config).await?, args, format).await,
        Command::Count(args) => cmd_count(&open(&config).await?, args, format).await,
        Command::Collections => cmd_collections(&open(&config).await?, format).await,
    }
}

/// Config file first, then `--data-dir` on top.
fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.store.root = dir.clone();
    }
    debug!(root = %config.store.root.display(), "configuration loaded");
    Ok(config)
}

async fn open(config: &ServerConfig) -> anyhow::Result<Arc<Repository>> {
    Repository::open(config.store.clone())
        .await
        .with_context(|| format!("opening store at {}", config.store.root.display()))
}

fn parse_object(raw: &str, what: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str(raw).with_context(|| format!("{what} is not valid JSON"))? {
        Value::Object(map) => Ok(map),
        other => bail!("{what} must be a JSON object, got {other}"),
    }
}

fn parse_query(raw: Option<&str>) -> anyhow::Result<Option<Query>> {
    raw.map(|q| parse_object(q, "query")).transpose()
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_document(document: &Document) {
    let id = document.id().unwrap_or("-");
    println!("{}  {}", id.yellow().bold(), Value::Object(document.as_map().clone()));
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = args.uploads_dir {
        config.uploads_dir = dir;
    }
    println!(
        "PetCare server on {} (data: {})",
        config.bind_addr.to_string().bold(),
        config.store.root.display()
    );
    PetcareServer::new(config).serve().await?;
    Ok(())
}

async fn cmd_insert(repo: &Arc<Repository>, args: InsertArgs, format: OutputFormat) -> anyhow::Result<()> {
    let document = Document::from(parse_object(&args.document, "document")?);
    let result = repo.collection(&args.collection)?.insert_one(document).await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&result)?)?,
        OutputFormat::Text => println!("{} Inserted {}", "✓".green().bold(), result.inserted_id.yellow()),
    }
    Ok(())
}

async fn cmd_find(repo: &Arc<Repository>, args: FindArgs, format: OutputFormat) -> anyhow::Result<()> {
    let query = parse_query(args.query.as_deref())?;
    let documents = repo.collection(&args.collection)?.find(query.as_ref()).await?;
    match format {
        OutputFormat::Json => {
            print_json(&Value::Array(documents.into_iter().map(Document::into_value).collect()))?
        }
        OutputFormat::Text if documents.is_empty() => println!("No documents."),
        OutputFormat::Text => documents.iter().for_each(print_document),
    }
    Ok(())
}

async fn cmd_get(repo: &Arc<Repository>, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let Some(document) = repo.collection(&args.collection)?.get(&args.id).await? else {
        bail!("no document {} in {}", args.id, args.collection);
    };
    match format {
        OutputFormat::Json => print_json(&document.into_value())?,
        OutputFormat::Text => print_document(&document),
    }
    Ok(())
}

async fn cmd_update(repo: &Arc<Repository>, args: UpdateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let query = parse_object(&args.query, "query")?;
    let update = Update::parse(parse_object(&args.update, "update")?)?;
    let result = repo.collection(&args.collection)?.update_one(&query, &update).await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&result)?)?,
        OutputFormat::Text => println!(
            "Matched {}, modified {}",
            result.matched_count.to_string().bold(),
            result.modified_count.to_string().bold()
        ),
    }
    Ok(())
}

async fn cmd_delete(repo: &Arc<Repository>, args: DeleteArgs, format: OutputFormat) -> anyhow::Result<()> {
    let query = parse_object(&args.query, "query")?;
    let result = repo.collection(&args.collection)?.delete_one(&query).await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&result)?)?,
        OutputFormat::Text => println!("Deleted {}", result.deleted_count.to_string().bold()),
    }
    Ok(())
}

async fn cmd_distinct(repo: &Arc<Repository>, args: DistinctArgs, format: OutputFormat) -> anyhow::Result<()> {
    let values = repo.collection(&args.collection)?.distinct(&args.field).await?;
    match format {
        OutputFormat::Json => print_json(&Value::Array(values))?,
        OutputFormat::Text => values.iter().for_each(|v| println!("  {v}")),
    }
    Ok(())
}

async fn cmd_count(repo: &Arc<Repository>, args: CountArgs, format: OutputFormat) -> anyhow::Result<()> {
    let query = parse_query(args.query.as_deref())?;
    let count = repo.collection(&args.collection)?.count(query.as_ref()).await?;
    match format {
        OutputFormat::Json => print_json(&Value::from(count))?,
        OutputFormat::Text => println!("{}", count.to_string().bold()),
    }
    Ok(())
}

async fn cmd_collections(repo: &Arc<Repository>, format: OutputFormat) -> anyhow::Result<()> {
    let names = repo.collections().await?;
    match format {
        OutputFormat::Json => print_json(&Value::from(names))?,
        OutputFormat::Text if names.is_empty() => println!("No collections."),
        OutputFormat::Text => {
            for name in &names {
                let count = repo.count(name, None).await?;
                println!("  {} ({count})", name.cyan());
            }
        }
    }
    Ok(())
}
