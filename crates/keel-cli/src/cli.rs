use std::path::PathBuf;

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Build, publish and sync package repositories",
    arg_required_else_help = true
)]
pub struct Args {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file to use instead of the default one
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// HTTP proxy for remote repositories
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Custom user agent for remote repositories
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Extra `Name: value` headers sent to remote repositories
    #[arg(long, global = true)]
    pub header: Option<Vec<String>>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync every enabled repository into the local cache
    #[command(alias = "S")]
    Sync {
        /// Download bundles even if the cache is up to date
        #[arg(short, long)]
        force: bool,
    },

    /// Search packages across synced repositories
    #[command(alias = "s")]
    Search(SearchArgs),

    /// Generate a repository from a package tree and built artifacts
    CreateRepo(CreateRepoArgs),
}

#[derive(ClapArgs)]
pub struct SearchArgs {
    /// Regular expression matched against `category/name`, or the label /
    /// file pattern with the flags below
    pub pattern: String,

    /// Match packages carrying a label with this key
    #[arg(long, conflicts_with_all = ["label_regex", "file"])]
    pub label: bool,

    /// Match `key=value` labels against the pattern
    #[arg(long, conflicts_with = "file")]
    pub label_regex: bool,

    /// Match installed file paths against the pattern
    #[arg(long)]
    pub file: bool,
}

#[derive(ClapArgs)]
pub struct CreateRepoArgs {
    /// Repository name
    #[arg(long)]
    pub name: String,

    /// Repository description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Repository type: disk, http or registry
    #[arg(long = "type", default_value = "disk")]
    pub repo_type: String,

    /// Output directory, or image prefix for registry repositories
    #[arg(long)]
    pub output: String,

    /// Package tree directories
    #[arg(long = "tree", required = true)]
    pub trees: Vec<PathBuf>,

    /// Directory holding built artifacts and their metadata files
    #[arg(long, default_value = "build")]
    pub packages: PathBuf,

    /// Mirrors advertised in the published spec
    #[arg(long, num_args = 1..)]
    pub urls: Vec<String>,

    /// Repository priority, lower wins
    #[arg(long, default_value_t = 1)]
    pub priority: i32,

    /// Start the revision count over
    #[arg(long)]
    pub reset_revision: bool,

    /// Image prefix for package images (registry repositories)
    #[arg(long, default_value = "")]
    pub image_prefix: String,

    /// Push built images
    #[arg(long)]
    pub push_images: bool,

    /// Rebuild and push images even if they already exist
    #[arg(long)]
    pub force_push: bool,

    /// Container CLI used to build registry repositories
    #[arg(long, default_value = "docker")]
    pub backend: String,
}
