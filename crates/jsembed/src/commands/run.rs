use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use jsembed_config::Config;
use jsembed_host::Host;
use log::debug;

use crate::commands::{finish, run_until_idle, stop_on_ctrl_c};

#[derive(Debug, Clone, Parser)]
pub struct RunCmd {
    /// Script file to run
    pub file: Utf8PathBuf,

    /// Additional directory searched for bare module names, may be repeated
    #[arg(long = "module-path", short = 'm', value_name = "DIR")]
    pub module_paths: Vec<Utf8PathBuf>,

    /// Arguments passed to the script, replacing the configured ones
    #[arg(last = true)]
    pub args: Vec<String>,
}

impl RunCmd {
    /// Runs the script and returns the engine's exit status
    pub(crate) fn handle(&self, mut cfg: Config) -> Result<i32> {
        cfg.module_paths.extend(self.module_paths.iter().cloned());

        let script_args = if self.args.is_empty() {
            cfg.args.clone()
        } else {
            self.args.clone()
        };
        let mut args = vec![self.file.to_string()];
        args.extend(script_args);

        let program_name = cfg.program_name.clone();
        let mut host = Host::with_config(cfg);
        host.initialize(&program_name, &args)?;
        stop_on_ctrl_c(host.stop_handle());

        debug!("Running {}", self.file);
        let outcome = host
            .run(self.file.as_std_path())
            .and_then(|_| run_until_idle(&mut host));

        Ok(finish(host, outcome))
    }
}
