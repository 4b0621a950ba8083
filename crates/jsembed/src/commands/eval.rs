use anyhow::Result;
use clap::Parser;
use jsembed_config::Config;
use jsembed_host::{Host, HostError, ValueKind};

use crate::commands::{finish, run_until_idle, stop_on_ctrl_c};

#[derive(Debug, Clone, Parser)]
pub struct EvalCmd {
    /// Source text to evaluate
    pub code: String,

    /// Print the result on a single line
    #[arg(long)]
    pub compact: bool,
}

impl EvalCmd {
    /// Evaluates the code, prints its value and returns the engine's exit status
    pub(crate) fn handle(&self, cfg: Config) -> Result<i32> {
        let program_name = cfg.program_name.clone();
        let args = cfg.args.clone();
        let mut host = Host::with_config(cfg);
        host.initialize(&program_name, &args)?;
        stop_on_ctrl_c(host.stop_handle());

        let outcome = self.evaluate(&mut host);
        let printed = match &outcome {
            Ok(Some(text)) => Some(text.clone()),
            _ => None,
        };

        let status = finish(host, outcome.map(|_| ()));
        if let Some(text) = printed {
            println!("{text}");
        }
        Ok(status)
    }

    /// The printable form of the completion value, `None` for `undefined`
    pub(crate) fn evaluate(&self, host: &mut Host) -> Result<Option<String>, HostError> {
        let value = host.evaluate(&self.code)?;
        run_until_idle(host)?;

        let kind = host.kind_of(&value)?;
        let text = match kind {
            ValueKind::Undefined => return Ok(None),
            // no JSON form
            ValueKind::Function | ValueKind::Symbol | ValueKind::BigInt => {
                let name = serde_json::to_value(kind)
                    .map_err(|e| HostError::Conversion(e.to_string()))?;
                format!("[{}]", name.as_str().unwrap_or_default())
            }
            _ => {
                let json = host.to_json(&value)?;
                if self.compact {
                    json.to_string()
                } else {
                    serde_json::to_string_pretty(&json)
                        .map_err(|e| HostError::Conversion(e.to_string()))?
                }
            }
        };

        Ok(Some(text))
    }
}
