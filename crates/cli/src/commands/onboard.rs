//! `stepwright onboard` — first-time setup.

use stepwright_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Stepwright — First-Time Setup");
    println!("=============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("Config directory exists: {}", config_dir.display());
    }

    let cache_dir = AppConfig::default().cache.resolved_dir();
    if !cache_dir.exists() {
        std::fs::create_dir_all(&cache_dir)?;
        println!("Created cache directory: {}", cache_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("  1. Set api_key in {} (or export OPENAI_API_KEY)", config_path.display());
        println!("  2. Run: stepwright doctor");
        println!("  3. Run: stepwright run plan.json --dom page.html\n");
    }

    Ok(())
}
