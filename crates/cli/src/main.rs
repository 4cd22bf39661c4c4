//! `openapi-ts`: generate a TypeScript module from an OpenAPI document.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use openapi_ts_core::{GenerationOptions, ResolveOptions, SchemaSource, generate};
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::{Config, FetchConfig};

#[derive(Parser, Debug)]
#[command(
    name = "openapi-ts",
    version,
    about = "Generate TypeScript types from an OpenAPI document"
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Schema location: a URL, a local path, or `-` to read stdin
    input: String,

    /// Write the module here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// TOML file with [generate] and [fetch] tables
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Authorization header value for remote documents
    #[arg(long, value_name = "TOKEN")]
    auth: Option<String>,

    /// Extra request header, repeatable
    #[arg(long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// HTTP method used to fetch remote documents
    #[arg(long, value_name = "METHOD")]
    http_method: Option<String>,

    /// Sort object properties
    #[arg(long)]
    alphabetize: bool,

    /// Drop deprecated properties
    #[arg(long)]
    exclude_deprecated: bool,

    /// Emit readonly properties and arrays
    #[arg(long)]
    immutable_types: bool,

    /// Allow arbitrary extra properties on every object
    #[arg(long)]
    additional_properties: bool,

    /// Properties with a default are never optional
    #[arg(long)]
    default_non_nullable: bool,

    /// Typed empty objects become Record<string, unknown>
    #[arg(long)]
    empty_objects_unknown: bool,

    /// Expand minItems/maxItems into tuples
    #[arg(long)]
    array_length: bool,
}

impl Cli {
    fn generation_options(&self, base: GenerationOptions) -> GenerationOptions {
        GenerationOptions {
            alphabetize: base.alphabetize || self.alphabetize,
            exclude_deprecated: base.exclude_deprecated || self.exclude_deprecated,
            immutable_types: base.immutable_types || self.immutable_types,
            additional_properties: base.additional_properties || self.additional_properties,
            default_non_nullable: base.default_non_nullable || self.default_non_nullable,
            empty_objects_unknown: base.empty_objects_unknown || self.empty_objects_unknown,
            support_array_length: base.support_array_length || self.array_length,
        }
    }

    fn resolve_options(&self, fetch: FetchConfig) -> Result<ResolveOptions, String> {
        let mut options = ResolveOptions {
            auth: self.auth.clone().or(fetch.auth),
            headers: fetch.headers,
            ..ResolveOptions::default()
        };
        if let Some(method) = self.http_method.clone().or(fetch.method) {
            options.http_method = method;
        }
        for header in &self.headers {
            let (name, value) = parse_header(header)?;
            options.headers.insert(name, value.into());
        }
        Ok(options)
    }

    fn source(&self) -> Result<SchemaSource, String> {
        if self.input == "-" {
            return Ok(SchemaSource::Stream(Box::new(tokio::io::stdin())));
        }
        SchemaSource::from_location(&self.input).map_err(|err| err.to_string())
    }
}

fn parse_header(header: &str) -> Result<(String, String), String> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| format!("Invalid header \"{header}\": expected NAME:VALUE"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Invalid header \"{header}\": empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => config::load(path)?,
        None => Config::default(),
    };
    let generation = cli.generation_options(config.generate);
    let resolve_options = cli.resolve_options(config.fetch)?;
    let source = cli.source()?;

    let started = Instant::now();
    let module = generate(source, resolve_options, &generation)
        .await
        .map_err(|err| err.to_string())?;

    match &cli.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| format!("Failed to create {}: {err}", parent.display()))?;
            }
            tokio::fs::write(path, module)
                .await
                .map_err(|err| format!("Failed to write {}: {err}", path.display()))?;
            info!(
                output = %path.display(),
                elapsed_ms = started.elapsed().as_millis(),
                "Types written."
            );
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(module.as_bytes())
                .await
                .map_err(|err| format!("Failed to write output: {err}"))?;
            stdout
                .flush()
                .await
                .map_err(|err| format!("Failed to write output: {err}"))?;
        }
    }
    Ok(())
}

async fn run_cli_async<F, Fut>(f: F) -> u8
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<(), String>> + Send,
{
    match f().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

fn is_plain_level(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    )
}

fn init_tracing() {
    // OPENAPI_TS_LOG takes a plain level ("debug") or a full filter spec
    let filter = match std::env::var("OPENAPI_TS_LOG") {
        Ok(level) if is_plain_level(&level) => {
            format!("openapi_ts={level},openapi_ts_core={level}")
        }
        Ok(spec) => spec,
        Err(_) => "openapi_ts=info,openapi_ts_core=info".to_string(),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    ExitCode::from(run_cli_async(|| run(cli)).await)
}
