//! Configuration inspection command.

use anyhow::Result;

use crate::cli::types::{ConfigArgs, ConfigCommand};
use crate::infrastructure::config::ConfigLoader;

/// Show the effective configuration after file and environment merging.
pub async fn execute(args: ConfigArgs, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = ConfigLoader::load()?;
            if json_mode {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", serde_yaml::to_string(&config)?);
            }
            Ok(())
        }
    }
}
