use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use chunklab_indexer::Objective;

/// Compare chunking strategies end to end: chunk extracted documents,
/// build search-engine collections and analyse processing telemetry.
#[derive(Parser, Debug)]
#[command(name = "chunklab", version, about = "Chunking strategy comparison toolkit")]
pub struct CliArgs {
    /// Log level filter (overrides RUST_LOG), e.g. "debug" or "chunklab_chunker=trace"
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Chunking config file (TOML, JSON or YAML)
    #[arg(long, global = true, env = "CHUNKING_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List extraction methods and the strategies that have artifacts for them
    List,

    /// Run the chunking pipeline over extracted documents
    Chunk(ChunkArgs),

    /// Flatten artifacts into JSONL collections
    Index(IndexArgs),

    /// Analyse processing telemetry recorded in artifacts
    Analyze {
        #[command(subcommand)]
        command: AnalyzeCommand,
    },
}

#[derive(Args, Debug)]
pub struct ChunkArgs {
    /// Only documents from these extraction methods (repeatable)
    #[arg(long = "extraction-method")]
    pub extraction_methods: Vec<String>,

    /// Strategies to run, overriding the config file (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub strategies: Vec<String>,

    /// Maximum number of documents to process
    #[arg(long, env = "MAX_DOCUMENTS")]
    pub max_documents: Option<usize>,

    /// Concurrent (document, strategy) units
    #[arg(long)]
    pub workers: Option<usize>,

    /// Skip units whose artifact already exists
    #[arg(long)]
    pub skip_existing: bool,
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Index every available (extraction method, strategy) combination
    #[arg(long, conflicts_with_all = ["extraction_method", "chunking_strategy"])]
    pub all: bool,

    #[arg(long, required_unless_present = "all", requires = "chunking_strategy")]
    pub extraction_method: Option<String>,

    #[arg(long, required_unless_present = "all", requires = "extraction_method")]
    pub chunking_strategy: Option<String>,

    /// Maximum number of documents per combination
    #[arg(long, env = "MAX_DOCUMENTS")]
    pub max_documents: Option<usize>,

    /// Delete and rebuild collections instead of adding new chunks
    #[arg(long)]
    pub force_recreate: bool,
}

#[derive(Subcommand, Debug)]
pub enum AnalyzeCommand {
    /// Per-strategy and per-extraction-method metric summaries
    Summary {
        /// Restrict to one extraction method
        #[arg(long)]
        extraction_method: Option<String>,
    },

    /// Compare two strategies (deltas are B minus A)
    Compare {
        strategy_a: String,
        strategy_b: String,
        #[arg(long)]
        extraction_method: Option<String>,
    },

    /// Pick the best strategy for an objective
    Optimal {
        #[arg(long, value_enum, default_value = "minimize-time")]
        objective: ObjectiveArg,
        #[arg(long)]
        extraction_method: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectiveArg {
    MinimizeTime,
    MinimizeMemory,
    MaximizeChunkDensity,
}

impl From<ObjectiveArg> for Objective {
    fn from(arg: ObjectiveArg) -> Self {
        match arg {
            ObjectiveArg::MinimizeTime => Objective::MinimizeTime,
            ObjectiveArg::MinimizeMemory => Objective::MinimizeMemory,
            ObjectiveArg::MaximizeChunkDensity => Objective::MaximizeChunkDensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn index_requires_all_or_a_combination() {
        assert!(CliArgs::try_parse_from(["chunklab", "index"]).is_err());
        assert!(CliArgs::try_parse_from(["chunklab", "index", "--extraction-method", "pypdf"]).is_err());
        assert!(CliArgs::try_parse_from(["chunklab", "index", "--all", "--extraction-method", "pypdf"]).is_err());

        let args = CliArgs::try_parse_from([
            "chunklab",
            "index",
            "--extraction-method",
            "pypdf",
            "--chunking-strategy",
            "semantic",
            "--force-recreate",
        ])
        .unwrap();
        match args.command {
            Command::Index(index) => {
                assert!(!index.all);
                assert!(index.force_recreate);
                assert_eq!(index.chunking_strategy.as_deref(), Some("semantic"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn chunk_strategies_are_comma_separated() {
        let args = CliArgs::try_parse_from([
            "chunklab",
            "--log-level",
            "debug",
            "chunk",
            "--strategies",
            "fixed_size,semantic",
            "--extraction-method",
            "pypdf",
        ])
        .unwrap();
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        match args.command {
            Command::Chunk(chunk) => {
                assert_eq!(chunk.strategies, vec!["fixed_size", "semantic"]);
                assert_eq!(chunk.extraction_methods, vec!["pypdf"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn analyze_optimal_parses_objective() {
        let args = CliArgs::try_parse_from([
            "chunklab",
            "analyze",
            "optimal",
            "--objective",
            "maximize-chunk-density",
        ])
        .unwrap();
        match args.command {
            Command::Analyze {
                command: AnalyzeCommand::Optimal { objective, .. },
            } => assert_eq!(Objective::from(objective), Objective::MaximizeChunkDensity),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
