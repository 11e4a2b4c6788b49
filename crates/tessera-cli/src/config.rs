use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use tessera::{
    CodecConfig, GeneratorConfig, GeneratorMode, MAX_NODE_ID, MAX_STRIPES, NodeIdConfig,
    PublicIdFormat, RollbackPolicy, SNOWFLAKE_EPOCH_MS, SegmentConfig, SnowflakeConfig,
    default_stripes,
};

/// Runtime configuration for the `tessera` binary.
///
/// Every setting is read from a flag or the matching environment variable
/// (a `.env` file is loaded first), then validated into a [`Config`].
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tessera",
    version,
    about = "Mint and inspect ULIDs, segment ids and public ids"
)]
pub struct CliArgs {
    /// Explicit node id in `[0, 1023]`. When absent the node id is resolved
    /// from `TESSERA_NODE_ID`, `TESSERA_ID_NODE_ID`, then the platform
    /// instance variables.
    #[arg(long, global = true)]
    pub node_id: Option<i64>,

    /// Serialize all ULID generation through one lane.
    ///
    /// Environment variable: `TESSERA_STRICT`
    #[arg(long, env = "TESSERA_STRICT", global = true, default_value_t = false)]
    pub strict: bool,

    /// Number of striped lanes. Defaults to one per core, at most 32.
    ///
    /// Environment variable: `TESSERA_STRIPES`
    #[arg(long, env = "TESSERA_STRIPES", global = true)]
    pub stripes: Option<usize>,

    /// Reaction to a wall clock that moved backwards, for ULIDs and
    /// Snowflake ids alike.
    ///
    /// Environment variable: `TESSERA_ROLLBACK`
    #[arg(long, env = "TESSERA_ROLLBACK", global = true, value_enum, default_value_t = Rollback::UseLast)]
    pub rollback: Rollback,

    /// Embed the node id in every ULID's random part.
    ///
    /// Environment variable: `TESSERA_EMBED_NODE_ID`
    #[arg(long, env = "TESSERA_EMBED_NODE_ID", global = true, default_value_t = false)]
    pub embed_node_id: bool,

    /// Unix millisecond that Snowflake timestamp zero stands for.
    ///
    /// Environment variable: `TESSERA_SNOWFLAKE_EPOCH_MS`
    #[arg(long, env = "TESSERA_SNOWFLAKE_EPOCH_MS", global = true, default_value_t = SNOWFLAKE_EPOCH_MS)]
    pub snowflake_epoch_ms: u64,

    /// Ids reserved per segment refill.
    ///
    /// Environment variable: `TESSERA_SEGMENT_STEP`
    #[arg(long, env = "TESSERA_SEGMENT_STEP", global = true, default_value_t = SegmentConfig::DEFAULT_STEP)]
    pub segment_step: u32,

    /// Public id payload encoding.
    ///
    /// Environment variable: `TESSERA_PUBLIC_ID_FORMAT`
    #[arg(long, env = "TESSERA_PUBLIC_ID_FORMAT", global = true, value_enum, default_value_t = Format::UlidBase32)]
    pub format: Format,

    /// Append a two-character checksum to public ids.
    ///
    /// Environment variable: `TESSERA_PUBLIC_ID_CHECKSUM`
    #[arg(long, env = "TESSERA_PUBLIC_ID_CHECKSUM", global = true, default_value_t = false)]
    pub checksum: bool,

    /// Character between the type prefix and the payload.
    ///
    /// Environment variable: `TESSERA_PUBLIC_ID_SEPARATOR`
    #[arg(long, env = "TESSERA_PUBLIC_ID_SEPARATOR", global = true, default_value_t = '_')]
    pub separator: char,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the resolved node id and where it came from.
    NodeId,
    /// Generate ULIDs.
    Ulid {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Generate node-keyed 64-bit Snowflake ids.
    Snowflake {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Allocate legacy ids from an in-process segment table.
    Segment {
        /// Allocation scope, e.g. a table name.
        scope: String,
        /// Qualify the scope with a tenant.
        #[arg(long)]
        tenant: Option<i64>,
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Encode ULIDs as public ids. Generates one when none is given.
    Encode {
        /// Type prefix, `[a-z0-9]{2,10}`.
        #[arg(short = 't', long = "type")]
        id_type: String,
        ulids: Vec<String>,
    },
    /// Decode and validate public ids.
    Decode { public_ids: Vec<String> },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollback {
    UseLast,
    FailFast,
    Wait,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    UlidBase32,
    Base62,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeIdConfig,
    pub generator: GeneratorConfig,
    pub embed_node_id: bool,
    pub snowflake: SnowflakeConfig,
    pub segment: SegmentConfig,
    pub codec: CodecConfig,
    pub command: Command,
}

impl TryFrom<CliArgs> for Config {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if let Some(node_id) = args.node_id {
            if !(0..=i64::from(MAX_NODE_ID)).contains(&node_id) {
                bail!("--node-id ({node_id}) must be within [0, {MAX_NODE_ID}]");
            }
        }

        let mode = if args.strict {
            if args.stripes.is_some() {
                bail!("TESSERA_STRIPES cannot be combined with TESSERA_STRICT");
            }
            GeneratorMode::Strict
        } else {
            let stripes = args.stripes.unwrap_or_else(default_stripes);
            if stripes == 0 {
                bail!("TESSERA_STRIPES must be greater than 0");
            }
            if stripes > MAX_STRIPES {
                bail!("TESSERA_STRIPES ({stripes}) exceeds the maximum of {MAX_STRIPES}");
            }
            GeneratorMode::Striped { stripes }
        };

        if args.segment_step == 0 {
            bail!("TESSERA_SEGMENT_STEP must be greater than 0");
        }

        if !args.separator.is_ascii_punctuation() {
            bail!(
                "TESSERA_PUBLIC_ID_SEPARATOR ({:?}) must be an ASCII punctuation character",
                args.separator
            );
        }

        let rollback = match args.rollback {
            Rollback::UseLast => RollbackPolicy::UseLast,
            Rollback::FailFast => RollbackPolicy::fail_fast(),
            Rollback::Wait => RollbackPolicy::wait(),
        };
        let format = match args.format {
            Format::UlidBase32 => PublicIdFormat::UlidBase32,
            Format::Base62 => PublicIdFormat::Base62,
        };

        Ok(Self {
            node: NodeIdConfig {
                node_id: args.node_id,
                ..NodeIdConfig::default()
            },
            generator: GeneratorConfig {
                mode,
                rollback,
                node_id: None,
            },
            embed_node_id: args.embed_node_id,
            snowflake: SnowflakeConfig {
                epoch_ms: args.snowflake_epoch_ms,
                rollback,
            },
            segment: SegmentConfig {
                step: args.segment_step,
            },
            codec: CodecConfig {
                format,
                checksum: args.checksum,
                separator: args.separator,
            },
            command: args.command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Config> {
        let args = CliArgs::try_parse_from(std::iter::once("tessera").chain(args.iter().copied()))?;
        Config::try_from(args)
    }

    #[test]
    fn defaults() {
        let config = parse(&["node-id"]).unwrap();
        assert_eq!(config.node.node_id, None);
        assert_eq!(config.generator.rollback, RollbackPolicy::UseLast);
        assert_eq!(config.segment.step, 1000);
        assert_eq!(config.snowflake.epoch_ms, SNOWFLAKE_EPOCH_MS);
        assert_eq!(config.codec, CodecConfig::default());
        assert!(matches!(config.command, Command::NodeId));
    }

    #[test]
    fn flags_are_validated() {
        assert!(parse(&["--node-id", "1024", "node-id"]).is_err());
        assert!(parse(&["--node-id", "-1", "node-id"]).is_err());
        assert!(parse(&["--stripes", "0", "ulid"]).is_err());
        assert!(parse(&["--stripes", "4096", "ulid"]).is_err());
        assert!(parse(&["--strict", "--stripes", "4", "ulid"]).is_err());
        assert!(parse(&["--segment-step", "0", "segment", "orders"]).is_err());
        assert!(parse(&["--separator", "a", "decode"]).is_err());
    }

    #[test]
    fn subcommand_arguments() {
        let config = parse(&[
            "encode",
            "--type",
            "ord",
            "--format",
            "base62",
            "--checksum",
            "01ARZ3NDEKTSV4RRFFQ69G5FAV",
        ])
        .unwrap();
        assert_eq!(config.codec.format, PublicIdFormat::Base62);
        assert!(config.codec.checksum);
        match config.command {
            Command::Encode { id_type, ulids } => {
                assert_eq!(id_type, "ord");
                assert_eq!(ulids, vec!["01ARZ3NDEKTSV4RRFFQ69G5FAV"]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let config = parse(&["--strict", "--rollback", "fail-fast", "ulid", "-n", "3"]).unwrap();
        assert_eq!(config.generator.mode, GeneratorMode::Strict);
        assert_eq!(config.generator.rollback, RollbackPolicy::fail_fast());
        assert!(matches!(config.command, Command::Ulid { count: 3 }));
    }
}
