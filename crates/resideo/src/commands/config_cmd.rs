//! Config subcommand handlers.

use std::io::BufRead;

use resideo_config::{Secret, store_secret};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat, SecretArg};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Copy of `cfg` with plaintext secrets masked.
fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    if out.credentials.consumer_key.is_some() {
        out.credentials.consumer_key = Some(REDACTED.into());
    }
    if out.credentials.access_token.is_some() {
        out.credentials.access_token = Some(REDACTED.into());
    }
    out
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::active_path(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&config::load(global)?);
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)
                    .map_err(|e| CliError::Serialization(e.to_string()))?,
                format => output::render_single(format, &cfg, |_| String::new(), |_| String::new())?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetSecret { secret } => {
            let secret = match secret {
                SecretArg::ConsumerKey => Secret::ConsumerKey,
                SecretArg::AccessToken => Secret::AccessToken,
            };
            eprintln!("Paste the {secret} and press Enter:");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let value = line.trim();
            if value.is_empty() {
                return Err(CliError::Validation {
                    field: secret.keyring_user().into(),
                    reason: "must not be empty".into(),
                });
            }
            store_secret(secret, value)?;
            eprintln!("Stored the {secret} in the system keyring.");
            Ok(())
        }
    }
}
