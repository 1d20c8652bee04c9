use clap::{Args, Parser, Subcommand};

/// Booster - incremental dependency tracking for script pipelines
///
/// Booster computes what every script of a pipeline really depends on (its
/// imports, transitively, and the data files it declares) and feeds that to
/// make, so steps, linters and tests rerun exactly when something they depend
/// on changed.
#[derive(Parser, Debug)]
#[command(name = "booster")]
#[command(author = "Booster Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Incremental dependency tracking for script pipelines", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Configuration arguments shared by all commands
#[derive(Args, Debug, Clone, Default)]
pub struct CommonConfigArgs {
    /// Config file path (default: nearest booster.toml)
    #[arg(short = 'c', long, env = "BOOSTER_CONFIG", global = true)]
    pub config: Option<String>,

    /// Tree scanned for source files
    #[arg(long, env = "BOOSTER_SOURCE_ROOT", global = true)]
    pub source_root: Option<String>,

    /// Directory holding markers and dependency fragments
    #[arg(long, env = "BOOSTER_CACHE_ROOT", global = true)]
    pub cache_root: Option<String>,

    /// Steps using a script also depend on its scan marker
    #[arg(long, env = "BOOSTER_STRICT", global = true)]
    pub strict: bool,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "BOOSTER_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan source files and write their dependency fragments
    Deps(DepsArgs),

    /// Build the whole-project graph and write every dependency fragment
    Graph(GraphArgs),

    /// Emit the makefile prelude to include from the pipeline's Makefile
    Makefile(MakefileArgs),

    /// Print what a step running the given scripts depends on
    Uses(UsesArgs),

    /// Print the flattened source or executable context of a file
    Context(ContextArgs),

    /// Run the static analyzer on files whose scan marker is stale
    Scan(CheckArgs),

    /// Run the test runner on files whose test marker is stale
    Test(CheckArgs),

    /// Create or refresh a marker
    Mark(MarkArgs),

    /// Delete sentinels of grouped targets with missing outputs
    Heal,

    /// Run a pipeline command, deleting its outputs if it fails
    Exec(ExecArgs),

    /// Configuration management utilities
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct DepsArgs {
    /// Source files
    #[arg(required = true)]
    pub files: Vec<String>,
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Also print every fragment to stdout
    #[arg(long)]
    pub print: bool,
}

#[derive(Args, Debug)]
pub struct MakefileArgs {
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Command recipes use to call booster (default: booster)
    #[arg(long, env = "BOOSTER_BIN")]
    pub booster: Option<String>,
}

#[derive(Args, Debug)]
pub struct UsesArgs {
    /// Scripts the step runs
    #[arg(required = true)]
    pub scripts: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Source file
    pub file: String,

    /// Print the executable context (with declared inputs) instead of the source context
    #[arg(short, long)]
    pub executable: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Files to check (default: every file with such a check)
    pub files: Vec<String>,

    /// Check every file, even when files are given
    #[arg(long)]
    pub all: bool,

    /// Run even if the marker is fresh
    #[arg(long)]
    pub force: bool,

    /// Concurrent checks (default: checks.jobs, or the number of CPUs)
    #[arg(short, long, env = "BOOSTER_JOBS")]
    pub jobs: Option<usize>,
}

#[derive(Args, Debug)]
pub struct MarkArgs {
    /// Marker kind (sc, ec, inputs, scan, test)
    pub kind: String,

    /// Source file the marker belongs to
    pub file: String,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Output written by the command (repeatable)
    #[arg(short, long = "output")]
    pub outputs: Vec<String>,

    /// Keep outputs of a failed command
    #[arg(long, env = "BOOSTER_KEEP_CORRUPT_OUTPUT")]
    pub keep: bool,

    /// Command to run
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Validate {
        /// Path to config file (default: discovered)
        path: Option<String>,
    },
    /// Generate example config file
    Generate {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show effective configuration (file values with command-line overrides)
    Show,
}
