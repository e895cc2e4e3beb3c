//! Environment readiness check.

use crate::cli::output;
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use dashtap::ExtractionConfig;

/// Check Chromium availability and the effective configuration.
///
/// A configuration that failed to load is reported, not returned as an error.
pub async fn run(config: Result<ExtractionConfig>) -> Result<()> {
    let chromium_path = find_chromium();
    let (config, config_error) = match config {
        Ok(c) => (Some(c), None),
        Err(e) => (None, Some(format!("{e:#}"))),
    };
    let ready = chromium_path.is_some() && config.is_some();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium_path.as_ref().map(|p| p.display().to_string()),
            "config_error": config_error,
            "dashboard_url": config.as_ref().map(|c| c.dashboard_url.clone()),
            "sections": config.as_ref().map(|c| c.sections.len()),
            "metrics": config.as_ref().map(|c| c.metrics.len()),
            "ready": ready,
        }));
        return Ok(());
    }

    println!("Dashtap Doctor");
    println!("==============");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Set DASHTAP_CHROMIUM_PATH or install Chrome."),
    }
    match (&config, &config_error) {
        (Some(config), _) => {
            println!(
                "[OK] Configuration valid: {} sections, {} metrics",
                config.sections.len(),
                config.metrics.len()
            );
            println!("     Dashboard: {}", config.dashboard_url);
            println!(
                "     Headless:  {}",
                if config.headless { "yes" } else { "no" }
            );
        }
        (None, Some(e)) => println!("[!!] Configuration invalid: {e}"),
        (None, None) => {}
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
