use std::io::Write;

use anyhow::{Context, anyhow};
use clap::Parser;
use cli::{Cli, Command};
use plugin_metrics_agent::{AgentConfig, Pass, collect_graph_defs, collect_values, init_logger};
use serde::Serialize;

const BINARY: &str = env!("CARGO_BIN_NAME");

/// Main agent function.
///
/// The steps are:
/// - parse the CLI
/// - parse the config file
/// - run the selected plugins once
/// - print the results as JSON on stdout
///
/// Plugin failures are logged and the plugin is left out of the output.
/// The agent only fails if the config is invalid or if every selected plugin failed.
fn main() -> anyhow::Result<()> {
    init_logger();
    let cli = Cli::parse();

    log::debug!("Starting '{BINARY}' v{}", env!("CARGO_PKG_VERSION"));
    let mut config = AgentConfig::parse_file(&cli.config)?;

    match cli.command {
        Command::Collect(args) => {
            config.select(&args.plugin)?;
            let mut generators = config.into_generators();
            let pass = collect_values(&mut generators);
            print_pass(&pass)
        }
        Command::Graphdefs(args) => {
            config.select(&args.plugin)?;
            let mut generators = config.into_generators();
            let pass = collect_graph_defs(&mut generators);
            print_pass(&pass)
        }
        Command::Check => {
            let names: Vec<&str> = config.plugins.keys().map(String::as_str).collect();
            if let Some((name, _)) = config.plugins.iter().find(|(_, p)| p.command.is_empty()) {
                return Err(anyhow!("plugin '{name}' has an empty command"));
            }
            log::info!("Config file {} is valid, plugins: {names:?}", cli.config.display());
            Ok(())
        }
    }
}

fn print_pass<T: Serialize>(pass: &Pass<T>) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &pass.results).context("failed to write the results")?;
    writeln!(stdout).context("failed to write the results")?;

    if pass.all_failed() {
        return Err(anyhow!("every plugin failed: {}", pass.failed.join(", ")));
    }
    Ok(())
}

mod cli {
    use clap::{Args, Parser, Subcommand};
    use std::path::PathBuf;

    // NOTE: the doc comment attached to `Cli` is used by clap as the description of
    // the application. It is displayed at the start of the help message.

    /// Runs metric plugins once and prints their output as JSON.
    #[derive(Parser)]
    #[command(version)]
    pub struct Cli {
        #[command(subcommand)]
        pub command: Command,

        /// Path to the config file.
        #[arg(long, env = "PLUGIN_METRICS_CONFIG", default_value = "plugin-metrics.toml")]
        pub config: PathBuf,
    }

    #[derive(Subcommand)]
    pub enum Command {
        /// Run the plugins in emit mode and print their values.
        Collect(SelectArgs),

        /// Run the plugins in describe mode and print their graph definitions.
        Graphdefs(SelectArgs),

        /// Check the config file and exit.
        Check,
    }

    /// Selection of plugins, shared by several commands.
    #[derive(Args)]
    pub struct SelectArgs {
        /// Only run this plugin. Can be repeated.
        ///
        /// By default, every plugin of the config file is run.
        #[arg(long)]
        pub plugin: Vec<String>,
    }
}
