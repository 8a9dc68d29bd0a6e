//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{RepodexError, RepodexResult};
use crate::ui::{self, UiContext};

const KEYS: [&str; 14] = [
    "general.log_format",
    "general.state_dir",
    "storage.root",
    "index.enabled",
    "index.authoritative",
    "index.page_size",
    "index.writer_threads",
    "index.persist",
    "index.warm_on_start",
    "not_found_cache.timeout_secs",
    "not_found_cache.max_page_size",
    "metadata.generator_threads",
    "metadata.max_load_factor",
    "metadata.lock_timeout_secs",
];

pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> RepodexResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => println!("{}", toml::to_string_pretty(config)?),
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value).await?,
    }
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> RepodexResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok(&ctx, &format!("Configuration initialized at {}", path.display()));
    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> RepodexResult<()> {
    let ctx = UiContext::detect();
    let mut config = config.clone();
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => return Err(RepodexError::User(format!("Invalid log format: {}. Use text/json", value))),
        },
        ["general", "state_dir"] => config.general.state_dir = Some(value.into()),
        ["storage", "root"] => config.storage.root = Some(value.into()),

        ["index", "enabled"] => config.index.enabled = parse_bool(value)?,
        ["index", "authoritative"] => config.index.authoritative = parse_bool(value)?,
        ["index", "page_size"] => config.index.page_size = parse_number(value)?,
        ["index", "writer_threads"] => config.index.writer_threads = parse_number(value)?,
        ["index", "persist"] => config.index.persist = parse_bool(value)?,
        ["index", "warm_on_start"] => config.index.warm_on_start = parse_bool(value)?,

        ["not_found_cache", "timeout_secs"] => {
            config.not_found_cache.timeout_secs = parse_number(value)?
        }
        ["not_found_cache", "max_page_size"] => {
            config.not_found_cache.max_page_size = parse_number(value)?
        }

        ["metadata", "generator_threads"] => config.metadata.generator_threads = parse_number(value)?,
        ["metadata", "max_load_factor"] => config.metadata.max_load_factor = parse_number(value)?,
        ["metadata", "lock_timeout_secs"] => config.metadata.lock_timeout_secs = parse_number(value)?,

        _ => {
            ui::step_warn(&ctx, &format!("Unknown config key: {}", key));
            ui::remark(&ctx, &format!("Valid keys: {}", KEYS.join(", ")));
            ui::remark(&ctx, "Edit [[stores]] entries in the config file directly");
            return Err(RepodexError::User(format!("Unknown config key: {}", key)));
        }
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

fn parse_bool(value: &str) -> RepodexResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(RepodexError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> RepodexResult<T> {
    value
        .parse()
        .map_err(|_| RepodexError::User(format!("Invalid number: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_values() {
        assert!(parse_bool("yes").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
        assert_eq!(parse_number::<usize>("250").unwrap(), 250);
        assert!(parse_number::<u64>("-1").is_err());
    }

    #[tokio::test]
    async fn set_writes_config() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.toml"));

        set_value(&manager, &Config::default(), "index.page_size", "250")
            .await
            .unwrap();

        let saved = manager.load().await.unwrap();
        assert_eq!(saved.index.page_size, 250);
    }

    #[tokio::test]
    async fn unknown_key_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.toml"));
        assert!(set_value(&manager, &Config::default(), "vm.name", "x").await.is_err());
        assert!(!manager.path().exists());
    }
}
