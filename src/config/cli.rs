use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the postwall binary.
#[derive(Debug, Parser)]
#[command(name = "postwall", version, about = "Browse and edit a remote post collection")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "POSTWALL_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ClientOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Interactive client (the default).
    Shell,
    /// Load the collection once and print it, newest first.
    List(ListArgs),
    /// Create a post.
    Create(PostArgs),
    /// Replace every editable field of a post.
    Update(UpdateArgs),
    /// Delete a post.
    Delete(DeleteArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ClientOverrides {
    /// Override the post collection URL, e.g. <https://example.com/api/posts>.
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ListArgs {
    /// Print the posts as JSON instead of text.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PostArgs {
    #[arg(long)]
    pub author: String,
    #[arg(long)]
    pub content: String,
    /// Image to attach; an empty value means no image.
    #[arg(long = "image-url", value_name = "URL")]
    pub image_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct UpdateArgs {
    #[arg(long)]
    pub id: String,
    #[command(flatten)]
    pub post: PostArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DeleteArgs {
    #[arg(long)]
    pub id: String,
}
