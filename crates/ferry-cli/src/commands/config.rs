//! Config command implementation.

use anyhow::Result;

use ferry_core::config::Config;

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub async fn run(args: ConfigArgs, json: bool) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = super::load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path();
            if json {
                println!("{}", serde_json::json!({ "path": path }));
            } else {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}
