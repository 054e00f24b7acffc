use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: BootbinCommand,
    /// Directory cache roots are created in. Defaults to the home directory
    #[clap(long, global = true)]
    pub(crate) base_dir: Option<PathBuf>,
    /// Give up on a download after this many seconds
    #[clap(long, global = true)]
    pub(crate) timeout: Option<u64>,
    /// More log output (-v info, -vv debug). `RUST_LOG` takes precedence
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
}

/// Selects a tool by built-in name or descriptor file.
#[derive(Debug, Args, Clone, PartialEq)]
pub struct ToolArgs {
    /// Name of a built-in tool (see `bootbin tools`)
    #[clap(required_unless_present = "file", conflicts_with = "file")]
    pub name: Option<String>,
    /// Path to a TOML tool descriptor
    #[clap(long)]
    pub file: Option<PathBuf>,
    /// Pin another version than the descriptor's (no leading 'v')
    #[clap(long, value_name = "VERSION")]
    pub pin: Option<String>,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum BootbinCommand {
    /// Makes sure the tool is available and prints its path. Downloads it if missing
    Ensure {
        #[command(flatten)]
        tool: ToolArgs,
        /// Print the result as JSON
        #[clap(long)]
        json: bool,
        /// Never download; fail if the tool is not on the search path
        #[clap(long)]
        offline: bool,
    },
    /// Output the path of a tool on the search path
    Which {
        name: String,
    },
    /// Ensure the tool, then run it with the given arguments
    Run {
        #[command(flatten)]
        tool: ToolArgs,
        #[clap(last = true)]
        args: Vec<String>,
    },
    /// Removes downloaded archives from the tool's cache root
    Clean {
        #[command(flatten)]
        tool: ToolArgs,
    },
    /// List built-in tools
    Tools,
}
