//! configure command - manage configuration

use super::CommandContext;
use crate::config::{Config, DEFAULT_PROFILE};
use crate::ConfigureAction;
use anyhow::Result;
use colored::Colorize;
use std::io::{self, Write};

pub async fn execute(ctx: &CommandContext, action: Option<ConfigureAction>) -> Result<()> {
    let profile = ctx.profile.as_deref();

    match action {
        Some(ConfigureAction::Set { key, value }) => set_config(profile, &key, &value),
        Some(ConfigureAction::Get { key }) => get_config(ctx, &key),
        Some(ConfigureAction::List) => list_config(ctx),
        Some(ConfigureAction::AddProfile { name }) => add_profile(&name),
        Some(ConfigureAction::RemoveProfile { name }) => remove_profile(&name),
        None => interactive_configure(profile),
    }
}

fn set_config(profile: Option<&str>, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load_stored(profile)?;
    config.set_value(key, value)?;
    config.save(profile)?;

    let shown = config.get_value(key).unwrap_or_default();
    println!("Set {} = {}", key.cyan(), shown);
    Ok(())
}

fn get_config(ctx: &CommandContext, key: &str) -> Result<()> {
    if !Config::keys().contains(&key) {
        anyhow::bail!("Unknown config key: {}", key);
    }
    match ctx.config.get_value(key) {
        Some(value) => println!("{}", value),
        None => println!("(not set)"),
    }
    Ok(())
}

fn list_config(ctx: &CommandContext) -> Result<()> {
    let profile = ctx.profile.as_deref().unwrap_or(DEFAULT_PROFILE);

    if ctx.is_json() {
        let values: serde_json::Map<String, serde_json::Value> = Config::keys()
            .iter()
            .map(|key| {
                let value = ctx
                    .config
                    .get_value(key)
                    .map_or(serde_json::Value::Null, serde_json::Value::String);
                (key.to_string(), value)
            })
            .collect();
        return ctx.print_json(&serde_json::json!({
            "profile": profile,
            "values": values,
            "profiles": Config::list_profiles()?,
        }));
    }

    println!("{} ({})", "Current configuration:".bold(), profile);
    println!();

    for key in Config::keys() {
        let value = ctx
            .config
            .get_value(key)
            .unwrap_or_else(|| "(not set)".to_string());
        println!("  {}: {}", key.cyan(), value);
    }

    println!();
    println!("{}", "Available profiles:".bold());

    let profiles = Config::list_profiles()?;
    if profiles.is_empty() {
        println!("  (none)");
    } else {
        for name in profiles {
            println!("  - {}", name);
        }
    }

    println!();
    println!(
        "Config file: {}",
        Config::config_path()?.display().to_string().dimmed()
    );

    Ok(())
}

fn add_profile(name: &str) -> Result<()> {
    if Config::list_profiles()?.iter().any(|p| p == name) {
        anyhow::bail!("Profile already exists: {}", name);
    }
    Config::default().save(Some(name))?;
    println!("Created profile: {}", name.green());
    println!(
        "Use 'quiver --profile {} configure set <key> <value>' to configure it.",
        name
    );
    Ok(())
}

fn remove_profile(name: &str) -> Result<()> {
    Config::delete_profile(name)?;
    println!("Removed profile: {}", name.red());
    Ok(())
}

fn prompt(label: &str, current: &str) -> Result<Option<String>> {
    print!("{} [{}]: ", label, current);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    Ok((!input.is_empty()).then(|| input.to_string()))
}

fn interactive_configure(profile: Option<&str>) -> Result<()> {
    println!(
        "{} ({})",
        "Quiver CLI Configuration".bold(),
        profile.unwrap_or(DEFAULT_PROFILE)
    );
    println!("Press Enter to keep current value.\n");

    let mut config = Config::load_stored(profile).unwrap_or_default();

    if let Some(endpoint) = prompt("Endpoint URL", config.endpoint.as_deref().unwrap_or(""))? {
        config.endpoint = Some(endpoint);
    }
    if let Some(access_key) = prompt("Access Key", config.access_key.as_deref().unwrap_or(""))? {
        config.access_key = Some(access_key);
    }
    let masked = if config.secret_key.is_some() { "***" } else { "" };
    if let Some(secret_key) = prompt("Secret Key", masked)? {
        config.secret_key = Some(secret_key);
    }
    if let Some(region) = prompt("Region", config.region.as_deref().unwrap_or(""))? {
        config.region = Some(region);
    }

    config.validate()?;
    config.save(profile)?;

    println!();
    println!(
        "{} Configuration saved to {}",
        "✓".green(),
        Config::config_path()?.display()
    );

    Ok(())
}
