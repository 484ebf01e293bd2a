//! `stepwright doctor` — diagnose configuration and connectivity.

use stepwright_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Stepwright Doctor");
    println!("=================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  -- No config file, using defaults (run `stepwright onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ok Config valid");
            config
        }
        Err(e) => {
            println!("  !! Config invalid: {e}");
            println!("\n  1 issue found.");
            return Ok(());
        }
    };

    println!("  ok Model: {} at {}", config.default_model, config.base_url);
    println!(
        "  ok Capabilities: native tools = {}, vision = {}",
        config.capabilities.supports_native_tools, config.capabilities.is_vision_capable
    );

    match stepwright_providers::build_client(&config) {
        Ok(client) => {
            println!("  ok Client '{}' ready ({:?} tool protocol)", client.name(), client.capabilities().tool_protocol);
            match client.health_check().await {
                Ok(true) => println!("  ok Backend reachable"),
                Ok(false) => {
                    println!("  !! Backend answered but reported unhealthy");
                    issues += 1;
                }
                Err(e) => {
                    println!("  !! Backend unreachable: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  !! {e}");
            issues += 1;
        }
    }

    if matches!(config.cache.backend.as_str(), "file" | "sqlite") {
        let dir = config.cache.resolved_dir();
        match std::fs::create_dir_all(&dir) {
            Ok(()) => println!("  ok Cache directory: {}", dir.display()),
            Err(e) => {
                println!("  !! Cache directory {} not writable: {e}", dir.display());
                issues += 1;
            }
        }
    } else {
        println!("  ok Cache backend: {}", config.cache.backend);
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
