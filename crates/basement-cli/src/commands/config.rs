//! Config command handlers

use std::path::Path;

use anyhow::{Context, Result};

use basement_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&Path>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            let views: Vec<String> = config
                .views
                .iter()
                .map(|v| format!("{}/{}", v.design, v.name))
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "host": config.host,
                    "bucket": config.bucket,
                    "user": config.effective_user(),
                    "persist": config.persist,
                    "connect": config.connect,
                    "transcoder": config.transcoder,
                    "environment": config.environment,
                    "data_dir": config.data_dir,
                    "views": views
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.host);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  host:        {}", config.host);
            println!("  bucket:      {}", config.bucket);
            println!("  user:        {}", config.effective_user());
            println!(
                "  password:    {}",
                if config.password.is_empty() {
                    "(not set)"
                } else {
                    "********"
                }
            );
            println!("  persist:     {}", config.persist);
            println!("  connect:     {}", config.connect);
            println!("  transcoder:  {}", config.transcoder);
            println!(
                "  environment: {}",
                config.environment.as_deref().unwrap_or("(not set)")
            );
            println!("  data_dir:    {}", config.data_dir.display());
            if !config.views.is_empty() {
                println!("  views:");
                for view in &config.views {
                    println!(
                        "    {}/{} (key: {}, reduce: {})",
                        view.design,
                        view.name,
                        view.key_field,
                        view.reduce.as_deref().unwrap_or("none")
                    );
                }
            }
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: &str, value: &str, config_path: Option<&Path>, output: &Output) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    config.set_field(key, value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
