use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use lib_livedata::access::query::{fetch_all, fetch_page_with_policy, QuerySpec};
use lib_livedata::configs::EndpointConfig;
use lib_livedata::{ApiClient, Direction, Filter, FilterOp, Sort};

/// A simple CLI tool to fetch a page (or all pages) of a remote collection.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Fetches records from a collection endpoint with optional filters and sorting. By default one page is printed as pretty JSON; with --all the whole collection is traversed via cursors."
)]
struct Args {
    /// Endpoint settings (also settable via LIVEDATA_* env vars or a JSON file).
    #[clap(flatten)]
    endpoint: EndpointConfig,

    /// Name of the collection to query.
    #[arg(short, long)]
    collection: String,

    /// Filter predicates as field:op:value, e.g. status:eq:open. May repeat.
    #[arg(short, long)]
    filter: Vec<String>,

    /// Sort specification as field or field:desc.
    #[arg(short, long)]
    sort: Option<String>,

    /// Traverse every page instead of fetching just the first.
    #[arg(short, long)]
    all: bool,

    /// Optional path for the JSON output. If not provided, the output will be printed to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_filter(raw: &str) -> anyhow::Result<Filter> {
    let mut parts = raw.splitn(3, ':');
    let (field, op, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(f), Some(o), Some(v)) => (f, o, v),
        _ => anyhow::bail!("filter '{}' is not field:op:value", raw),
    };
    let op = match op {
        "eq" => FilterOp::Eq,
        "neq" => FilterOp::Neq,
        "gt" => FilterOp::Gt,
        "gte" => FilterOp::Gte,
        "lt" => FilterOp::Lt,
        "lte" => FilterOp::Lte,
        "contains" => FilterOp::Contains,
        "in" => FilterOp::In,
        other => anyhow::bail!("unknown filter operator '{}'", other),
    };
    // Treat the value as JSON when it parses, otherwise as a plain string.
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::from(value));
    Ok(Filter::new(field, op, value))
}

fn parse_sort(raw: &str) -> anyhow::Result<Sort> {
    let (field, direction) = match raw.split_once(':') {
        Some((f, "asc")) => (f, Direction::Asc),
        Some((f, "desc")) => (f, Direction::Desc),
        Some((_, other)) => anyhow::bail!("unknown sort direction '{}'", other),
        None => (raw, Direction::Asc),
    };
    Ok(Sort {
        field: field.to_string(),
        direction,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings = match EndpointConfig::load_with(args.endpoint)?.resolved() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let client = ApiClient::with_policy(&settings.base_url, settings.credential.clone(), &settings.retry)?;

    let mut spec = QuerySpec::new(&args.collection, settings.page_size);
    for raw in &args.filter {
        spec = spec.filter(parse_filter(raw)?);
    }
    if let Some(raw) = &args.sort {
        spec = spec.sort(parse_sort(raw)?);
    }

    let json_output = if args.all {
        let records = fetch_all(&client, &spec).await?;
        log::info!("Traversed {} records from '{}'", records.len(), args.collection);
        serde_json::to_string_pretty(&records)?
    } else {
        let page = fetch_page_with_policy(&client, &spec, &settings.retry).await?;
        serde_json::to_string_pretty(&page)?
    };

    // Write the JSON output to a file or stdout.
    if let Some(output_path) = args.output {
        fs::write(output_path, json_output)?;
        println!("Saved query result to output file.");
    } else {
        io::stdout().write_all(json_output.as_bytes())?;
        println!();
    }

    Ok(())
}
