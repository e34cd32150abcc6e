mod cli;
mod db;
mod error;
mod io;
mod ncbi;
mod query;
mod resolver;

use anyhow::{Result, Context};
use clap::Parser;
use log::{info, warn};
use std::io::Write;
use std::fs::File;

use crate::cli::{CacheSubcommand, Cli, Commands};
use crate::db::ResultCache;
use crate::io::{write_records, NameReader, TSV_HEADER};
use crate::ncbi::{NcbiClient, NcbiConfig};
use crate::query::Query;
use crate::resolver::{Resolver, ResolverConfig, RetryPolicy};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(log_file) = cli.log_file {
        let file = File::create(&log_file)
            .with_context(|| format!("Failed to create log file: {}", log_file.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    match cli.command {
        Commands::Resolve(resolve_cmd) => handle_resolve_command(resolve_cmd)?,
        Commands::Cache(cache_cmd) => handle_cache_command(cache_cmd)?,
    }

    Ok(())
}

fn handle_resolve_command(cmd: cli::ResolveCommand) -> Result<()> {
    let mut names = cmd.names;
    names.extend(NameReader::new(cmd.input).read_all()?);

    if names.is_empty() {
        return Err(anyhow::anyhow!("No organism names given; pass names or --input files"));
    }

    let queries = names
        .iter()
        .map(|name| Query::parse(name).with_context(|| format!("Invalid organism name: {:?}", name)))
        .collect::<Result<Vec<_>>>()?;

    let ncbi_config = NcbiConfig::new(cmd.email)
        .with_tool(cmd.tool)
        .with_api_key(cmd.api_key);
    let client = NcbiClient::new(ncbi_config)?;

    let config = ResolverConfig {
        retry: RetryPolicy {
            backoff: cmd.backoff.into(),
            retry_not_found: !cmd.skip_unknown,
            ..RetryPolicy::default()
        },
        genus_fallback: !cmd.no_genus_fallback,
    };
    let resolver = Resolver::new(client, config);

    info!(
        "Resolving {} names (up to {} attempts each)",
        queries.len(),
        resolver.config().retry.attempts()
    );

    let records = match &cmd.cache {
        Some(path) => {
            let mut cache = ResultCache::new(path)?;
            resolver.resolve_all_cached(&queries, &mut cache, cmd.refresh)
        }
        None => resolver.resolve_all(&queries),
    };

    let degraded = records.iter().filter(|r| r.is_degraded()).count();
    if degraded > 0 {
        warn!("{} of {} names could not be resolved", degraded, records.len());
    }

    let mut writer: Box<dyn Write> = match &cmd.output {
        Some(path) => Box::new(File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?),
        None => Box::new(std::io::stdout()),
    };
    write_records(&mut writer, &records, cmd.format.into(), cmd.header)?;

    Ok(())
}

fn handle_cache_command(cmd: cli::CacheCommand) -> Result<()> {
    let mut cache = ResultCache::new(&cmd.database)?;

    match cmd.command {
        CacheSubcommand::List { with_assemblies } => {
            println!("{}\tcreated_at", TSV_HEADER);
            for cached in cache.list(with_assemblies)? {
                println!("{}\t{}", cached.record.to_tsv(), cached.created_at);
            }
        }

        CacheSubcommand::Stats => {
            let stats = cache.statistics()?;

            println!("metric\tvalue");
            println!("total_records\t{}", stats.total_records);
            println!("records_with_assemblies\t{}", stats.records_with_assemblies);
            println!("total_assemblies\t{}", stats.total_assemblies);
            println!("distinct_taxa\t{}", stats.distinct_taxa);
        }

        CacheSubcommand::Remove { name, force } => {
            if !force && !confirm(&format!("Remove cached record for {}?", name))? {
                info!("Operation cancelled");
                return Ok(());
            }

            if cache.remove(&name)? {
                info!("Record {} removed", name);
            } else {
                warn!("Record {} not found", name);
            }
        }

        CacheSubcommand::Clear { force } => {
            if !force && !confirm(&format!("Clear every record in {}?", cmd.database.display()))? {
                info!("Operation cancelled");
                return Ok(());
            }

            let removed = cache.clear()?;
            println!("Removed {} records", removed);
        }

        CacheSubcommand::Validate => {
            info!("Validating cache integrity...");
            let report = cache.validate()?;

            if report.has_warnings() {
                for warning in report.warnings() {
                    warn!("{}", warning);
                }
            }
            for error in report.errors() {
                println!("error\t{}", error);
            }

            if report.has_errors() {
                return Err(anyhow::anyhow!("Cache validation failed with {} error(s)", report.errors().len()));
            }
            println!("Cache is valid ({} warnings)", report.warnings().len());
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
