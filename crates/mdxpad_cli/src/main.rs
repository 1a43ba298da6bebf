//! mdxpad CLI
//!
//! Compiles and renders MDX documents, once or live.

mod cli;
mod commands;
mod output;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use mdxpad_core::Extensions;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::init::run_init;
use crate::commands::live::run_live;
use crate::commands::render::run_render;
use crate::utils::load_config;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match &cli.command {
        Commands::Render {
            file,
            format,
            gfm,
            frontmatter,
            math,
        } => {
            let config = load_config(cli.config.as_deref())?;
            // Flags only switch extensions on; the config file may have enabled more.
            let extensions = Extensions {
                gfm: *gfm || config.extensions.gfm,
                frontmatter: *frontmatter || config.extensions.frontmatter,
                math: *math || config.extensions.math,
            };
            run_render(file, format, &config, extensions)
        }
        Commands::Live { path, debounce_ms } => {
            let config = load_config(cli.config.as_deref())?;
            run_live(&config, path.clone(), *debounce_ms).map(|_| false)
        }
        Commands::Init { force } => run_init(*force).map(|_| false),
    }
}
