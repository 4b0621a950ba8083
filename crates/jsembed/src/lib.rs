pub mod commands;
pub mod utils;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::commands::{eval::EvalCmd, init::InitCmd, run::RunCmd};
use jsembed_config::Config;

#[derive(Debug, Parser)]
#[command(name = "jsembed")]
#[command(version)]
#[command(about = "jsembed - embedded JavaScript runner")]
#[command(
    long_about = "jsembed starts an embedded JavaScript engine, runs a script or expression in it \
and drives its event loop until no work is left."
)]
#[command(after_help = "EXAMPLES:\n  \
    jsembed init\n  \
    jsembed run app.js -- --port 8080\n  \
    jsembed eval '[1, 2, 3].map((n) => n * 2)'\n\
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path, defaults to ./jsembed.json
    #[arg(long, short = 'c', global = true, default_value_t = Config::default_path())]
    pub config: Utf8PathBuf,

    /// No logging except for errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Verbose logging (-v) or trace logging (-vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    /// Runs the selected command and returns the process exit status
    #[allow(clippy::missing_errors_doc)]
    pub fn handle(&self) -> anyhow::Result<i32> {
        match &self.command {
            Commands::Init(cmd) => cmd.handle(&self.config).map(|_| 0),
            Commands::Run(cmd) => cmd.handle(Config::load_or_default(&self.config)?),
            Commands::Eval(cmd) => cmd.handle(Config::load_or_default(&self.config)?),
        }
    }
}

#[derive(Debug, Subcommand)]
#[command(styles=utils::styles::get_styles())]
pub enum Commands {
    /// Run a script file
    #[command(
        long_about = "Run a script file and keep the event loop going until its timers finish. \
Arguments after `--` are visible to the script through process.argv."
    )]
    Run(RunCmd),

    /// Evaluate an expression and print the result
    #[command(long_about = "Evaluate source text, wait for pending work and print the result as JSON.")]
    Eval(EvalCmd),

    /// Initialize configuration file
    #[command(long_about = "Initialize jsembed.json configuration file.")]
    Init(InitCmd),
}
