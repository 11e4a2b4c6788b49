#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::io::{self, BufWriter, Write};

use anyhow::Context;
use clap::Parser;
use config::{CliArgs, Command, Config};
use telemetry::init_telemetry;
use tessera::{
    Environment, GeneratorConfig, IdScope, MemorySegmentRepository, NodeIdSource, ProcessEnv,
    PublicIdCodec, ResolvedNodeId, SegmentAllocator, SnowflakeGenerator, Ulid128, UlidGenerator,
    resolve_node_id,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = Config::try_from(args)?;

    init_telemetry()?;
    if cfg!(debug_assertions) {
        tracing::debug!("starting with config: {:#?}", config);
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    run(config, &ProcessEnv, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Resolves the node id, failing closed before any subcommand runs, then
/// executes the subcommand.
fn run(config: Config, env: &impl Environment, out: &mut impl Write) -> anyhow::Result<()> {
    let resolved = resolve_node_id(&config.node, env).context("unable to resolve the node id")?;

    match &config.command {
        Command::NodeId => {
            let source = match &resolved.source {
                NodeIdSource::Configured => "--node-id".to_owned(),
                NodeIdSource::PrimaryEnv => config.node.env_var.clone(),
                NodeIdSource::LegacyEnv => config.node.legacy_env_var.clone(),
                NodeIdSource::Platform { var } => format!("hash of {var}"),
            };
            writeln!(out, "{}\t{source}", resolved.node_id)?;
        }
        Command::Ulid { count } => {
            let generator = UlidGenerator::system(&generator_config(&config, &resolved));
            for _ in 0..*count {
                writeln!(out, "{}", generator.next()?)?;
            }
            let metrics = generator.metrics().snapshot();
            tracing::debug!(?metrics, "generated");
        }
        Command::Snowflake { count } => {
            let generator = SnowflakeGenerator::system(resolved.node_id, config.snowflake);
            for _ in 0..*count {
                writeln!(out, "{}", generator.next_id()?)?;
            }
        }
        Command::Segment {
            scope,
            tenant,
            count,
        } => {
            let scope = match tenant {
                Some(tenant) => IdScope::for_tenant(scope, *tenant)?,
                None => IdScope::new(scope)?,
            };
            let allocator = SegmentAllocator::new(config.segment, MemorySegmentRepository::new())?;
            for _ in 0..*count {
                writeln!(out, "{}", allocator.next_id(&scope)?)?;
            }
        }
        Command::Encode { id_type, ulids } => {
            let codec = PublicIdCodec::new(config.codec)?;
            if ulids.is_empty() {
                let generator = UlidGenerator::system(&generator_config(&config, &resolved));
                writeln!(out, "{}", codec.encode(id_type, generator.next()?)?)?;
            }
            for text in ulids {
                let id: Ulid128 = text
                    .parse()
                    .with_context(|| format!("invalid ULID {text:?}"))?;
                writeln!(out, "{}", codec.encode(id_type, id)?)?;
            }
        }
        Command::Decode { public_ids } => {
            let codec = PublicIdCodec::new(config.codec)?;
            for public_id in public_ids {
                let decoded = codec
                    .decode(public_id)
                    .with_context(|| format!("invalid public id {public_id:?}"))?;
                writeln!(
                    out,
                    "{}\t{}\t{}",
                    decoded.id_type,
                    decoded.internal_id,
                    decoded.internal_id.timestamp_ms()
                )?;
            }
        }
    }
    Ok(())
}

fn generator_config(config: &Config, resolved: &ResolvedNodeId) -> GeneratorConfig {
    let mut generator = config.generator.clone();
    if config.embed_node_id {
        generator.node_id = Some(resolved.node_id);
    }
    generator
}
