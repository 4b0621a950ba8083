use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use jsembed_config::Config;
use log::info;

use crate::utils::styles::{fmt_bold, fmt_dimmed, fmt_success};

#[derive(Debug, Clone, Parser)]
pub struct InitCmd {
    /// Overwrite an existing configuration file
    #[arg(long, short)]
    pub force: bool,
}

impl InitCmd {
    pub(crate) fn handle(&self, path: &Utf8PathBuf) -> Result<Config> {
        if path.exists() && !self.force {
            anyhow::bail!(
                "A jsembed config already exists at {}, use {} to overwrite it",
                fmt_dimmed(path.as_str()),
                fmt_bold("--force")
            );
        }

        let mut cfg = Config::default().with_path(path);
        if let Some(name) = std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|f| f.to_string_lossy().to_string()))
        {
            cfg.program_name = name;
        }

        cfg.save()?;

        info!(
            "{}",
            fmt_success(&format!(
                "{name} configuration created: {path}",
                name = fmt_bold("jsembed"),
                path = fmt_dimmed(path.as_str()),
            ))
        );

        Ok(cfg)
    }
}
