use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
}

#[derive(Parser, Debug)]
#[command(name = "imex")]
#[command(
    about = "Rewrites Dear ImGui so every context-dependent function takes an explicit ImGuiContext*"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a Dear ImGui checkout to the explicit-context API
    Convert(ConvertArgs),

    /// Rebase a branch, regenerating its [generated] conversion commits
    Rebase(RebaseArgs),

    /// Rewrite a rebase todo list (internal; used as sequence editor)
    Rtransform(RtransformArgs),

    /// Initialize an imex.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Path to the root of the Dear ImGui repository
    pub repository: PathBuf,

    /// Log every rewrite decision
    #[arg(short, long)]
    pub verbose: bool,

    /// Write the rewritten sources (default is a dry-run diff)
    #[arg(long)]
    pub apply: bool,

    /// Create the [generated] git commit after a successful apply
    #[arg(long, requires = "apply")]
    pub commit: bool,

    /// Rewrite the demo translation unit too (full-repo conversion)
    #[arg(long)]
    pub include_demo: bool,

    /// Dump the visited cursor tree to test_ast_dump.txt
    #[arg(long)]
    pub dump_test_ast: bool,

    /// Print the resolved call graph as Graphviz DOT and exit
    #[arg(long)]
    pub dump_callgraph: bool,

    /// Machine-readable JSON summary (single line)
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct RebaseArgs {
    /// Path to the root of the Dear ImGui repository
    pub repository: PathBuf,

    /// Branch to rebase
    #[arg(long)]
    pub branch: String,

    /// Base commit; the whole branch is replayed when omitted
    #[arg(long)]
    pub base: Option<String>,

    /// Replay onto this commit instead of the base
    #[arg(long)]
    pub onto: Option<String>,

    /// Log every rewrite decision
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
pub struct RtransformArgs {
    /// Rebase todo file to rewrite in place; filters stdin to stdout
    /// when omitted
    pub todo_file: Option<PathBuf>,

    /// Command to exec in place of each [generated] pick
    #[arg(long)]
    pub exec: String,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,

    /// Output directory; writes to stdout when omitted
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
