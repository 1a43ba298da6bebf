//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// mdxpad - Live MDX compiler and renderer
#[derive(Parser)]
#[command(name = "mdxpad")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile and render a document once
    Render {
        /// Document to render
        file: PathBuf,

        /// Output format (html, json)
        #[arg(short, long, default_value = "html")]
        format: String,

        /// Enable GitHub Flavored Markdown
        #[arg(long)]
        gfm: bool,

        /// Enable YAML and TOML frontmatter
        #[arg(long)]
        frontmatter: bool,

        /// Enable math
        #[arg(long)]
        math: bool,
    },

    /// Drive a live session with JSON events read from stdin
    Live {
        /// Document name used for messages and format detection
        #[arg(long)]
        path: Option<String>,

        /// Quiet window of the compile scheduler in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}
