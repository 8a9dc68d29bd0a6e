//! Stores command - show configured repositories

use crate::cli::args::{OutputFormat, StoresAction, StoresArgs};
use crate::config::Config;
use crate::error::RepodexResult;
use crate::model::{ArtifactStore, StoreKind};
use crate::ui::{self, UiContext};
use console::style;

pub async fn execute(args: StoresArgs, config: &Config) -> RepodexResult<()> {
    let StoresAction::List { format } = args.action;
    let stores = config.artifact_stores()?;

    if stores.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_warn_hint(
                    &ctx,
                    "No stores configured",
                    "Add [[stores]] entries to config.toml",
                );
            }
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&stores),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stores)?),
        OutputFormat::Plain => {
            for store in &stores {
                println!("{}", store.key);
            }
        }
    }
    Ok(())
}

fn detail(store: &ArtifactStore) -> String {
    match &store.kind {
        StoreKind::Hosted { readonly: true } => "read-only".to_string(),
        StoreKind::Hosted { readonly: false } => String::new(),
        StoreKind::Remote { url } => url.clone().unwrap_or_default(),
        StoreKind::Group { constituents } => constituents
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn print_table(stores: &[ArtifactStore]) {
    println!(
        "{:<36} {:<10} {}",
        style("KEY").bold(),
        style("STATE").bold(),
        style("DETAIL").bold()
    );
    println!("{}", "-".repeat(72));

    for store in stores {
        let state = if store.disabled {
            style("disabled").dim()
        } else if store.authoritative_index {
            style("authoritative").cyan()
        } else {
            style("enabled").green()
        };
        println!("{:<36} {:<10} {}", store.key.to_string(), state, detail(store));
    }

    println!();
    println!("{} store(s)", stores.len());
}
