//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use rollcall_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("Failed to serialize config")?
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.server_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  server_url:             {}", config.server_url);
            println!(
                "  event_url:              {}",
                config.event_url.as_deref().unwrap_or("(same as server_url)")
            );
            println!("  update_policy:          {:?}", config.update_policy);
            println!("  duplicate_policy:       {:?}", config.duplicate_policy);
            println!("  resync_on_reconnect:    {}", config.resync_on_reconnect);
            println!("  event_buffer:           {}", config.event_buffer);
            println!("  request_timeout_secs:   {}", config.request_timeout_secs);
            println!("  reconnect_initial_secs: {}", config.reconnect_initial_secs);
            println!("  reconnect_max_secs:     {}", config.reconnect_max_secs);
            println!();
            println!("Snapshot URL: {}", config.users_url());
            println!("Config file:  {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply_setting(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Change one key on a loaded configuration
fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "server_url" => {
            if value.is_empty() {
                bail!("server_url cannot be empty");
            }
            config.server_url = value.to_string();
        }
        "event_url" => {
            config.event_url = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }
        "update_policy" => {
            config.update_policy = value.parse().map_err(anyhow::Error::msg)?;
        }
        "duplicate_policy" => {
            config.duplicate_policy = value.parse().map_err(anyhow::Error::msg)?;
        }
        "resync_on_reconnect" => {
            config.resync_on_reconnect = value
                .parse()
                .context("Invalid value for resync_on_reconnect. Use 'true' or 'false'.")?;
        }
        "event_buffer" => {
            config.event_buffer = value
                .parse()
                .context("Invalid value for event_buffer. Use a positive number.")?;
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use a number of seconds.")?;
        }
        "reconnect_initial_secs" => {
            config.reconnect_initial_secs = value
                .parse()
                .context("Invalid value for reconnect_initial_secs. Use a number of seconds.")?;
        }
        "reconnect_max_secs" => {
            config.reconnect_max_secs = value
                .parse()
                .context("Invalid value for reconnect_max_secs. Use a number of seconds.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: server_url, event_url, update_policy, duplicate_policy, \
                 resync_on_reconnect, event_buffer, request_timeout_secs, \
                 reconnect_initial_secs, reconnect_max_secs",
                key
            );
        }
    }
    Ok(())
}
