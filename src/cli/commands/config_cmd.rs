//! Configuration display.

use console::style;

use crate::cli::icons::{dim_arrow, info};
use crate::config::Settings;

/// Print the effective settings.
pub fn cmd_config_show(settings: &Settings) -> anyhow::Result<()> {
    let source = settings
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults (no config file found)".to_string());

    println!("{} {}", info(), style("Effective configuration").bold());
    println!("  {} Source:   {}", dim_arrow(), source);
    println!("  {} Endpoint: {}", dim_arrow(), settings.endpoint);
    println!("  {} Analyze:  {}", dim_arrow(), settings.client_config().analyze_url());
    println!("  {} Timeout:  {}s", dim_arrow(), settings.request_timeout);
    println!("  {} Images:   {}", dim_arrow(), settings.image_dir.display());
    Ok(())
}
