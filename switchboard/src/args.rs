use std::path::PathBuf;

use clap::Parser;

/// Switchboard streaming client
#[derive(Debug, Parser)]
#[command(name = "switchboard", about = "Stream a prompt through one or more language models")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG")]
    pub config: PathBuf,

    /// Configured provider to ask; repeat to compare several models
    #[arg(short, long = "model", value_name = "NAME")]
    pub models: Vec<String>,

    /// System prompt sent before the conversation
    #[arg(short, long)]
    pub system: Option<String>,

    /// Image to attach to the prompt
    #[arg(long = "image", value_name = "PATH")]
    pub images: Vec<PathBuf>,

    /// Let the model call the built-in local tools
    #[arg(long)]
    pub tools: bool,

    /// Prompt text
    pub prompt: String,
}
