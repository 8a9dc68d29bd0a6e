//! Index command - inspect and maintain the content index

use super::open_engine;
use crate::cli::args::{IndexAction, IndexArgs, OutputFormat};
use crate::config::Config;
use crate::error::RepodexResult;
use crate::model::{IndexedStorePath, StoreKey};
use crate::ui::{self, TaskSpinner, UiContext};
use console::style;
use serde_json::json;

pub async fn execute(args: IndexArgs, config: &Config) -> RepodexResult<()> {
    let engine = open_engine(config).await?;
    let ctx = UiContext::detect();

    match args.action {
        IndexAction::Show {
            store,
            page,
            page_size,
            format,
        } => {
            let key: StoreKey = store.parse()?;
            let entries = engine
                .index()
                .get_all_indexed_paths_in_store(&key, page, page_size.max(1));
            let total = engine.index().count_in_store(&key);
            print_entries(&ctx, &key, &entries, total, format)?;
        }
        IndexAction::Lookup { store, path } => {
            let key: StoreKey = store.parse()?;
            match engine.index().get_indexed_store_path(&key, &path) {
                Some(entry) => {
                    ui::key_value(&ctx, "indexed as", &entry.path);
                    ui::key_value(&ctx, "origin", &entry.origin_key().to_string());
                }
                None => ui::step_info(&ctx, &format!("{} is not indexed in {}", path, key)),
            }
        }
        IndexAction::Clear { store, yes } => {
            let key: StoreKey = store.parse()?;
            let ctx = ctx.with_auto_yes(yes);
            let prompt = format!("Clear all index entries of {}?", key);
            if !ui::confirm(&ctx, &prompt, false).await? {
                ui::step_warn_hint(&ctx, "Nothing cleared", "Pass --yes to skip confirmation");
                return Ok(());
            }
            let cleared = engine.index().clear_all_indexed_path_in_store(&key, |_| {});
            engine.shutdown().await?;
            ui::step_ok(&ctx, &format!("Cleared {} entries from {}", cleared, key));
        }
        IndexAction::Warm => {
            let mut spinner = TaskSpinner::new(&ctx);
            spinner.start("Warming content index...");
            match engine.warm_index().await {
                Ok(report) => spinner.stop(&format!(
                    "Indexed {} stores: {} store entries, {} group entries",
                    report.stores, report.self_entries, report.group_entries
                )),
                Err(e) => {
                    spinner.stop_error("Index warm failed");
                    return Err(e);
                }
            }
            engine.shutdown().await?;
        }
    }
    Ok(())
}

fn print_entries(
    ctx: &UiContext,
    key: &StoreKey,
    entries: &[IndexedStorePath],
    total: usize,
    format: OutputFormat,
) -> RepodexResult<()> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = entries
                .iter()
                .map(|e| json!({ "path": e.path, "origin": e.origin_key().to_string() }))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "store": key.to_string(), "total": total, "entries": rows }))?
            );
        }
        OutputFormat::Plain => {
            for entry in entries {
                println!("{}\t{}", entry.path, entry.origin_key());
            }
        }
        OutputFormat::Table if entries.is_empty() => {
            ui::step_info(ctx, &format!("No index entries for {}", key));
        }
        OutputFormat::Table => {
            ui::intro(ctx, &format!("Index of {}", key));
            println!("{:<56} {}", style("PATH").bold(), style("ORIGIN").bold());
            for entry in entries {
                let origin = entry.origin_key().to_string();
                let origin = if entry.is_self_entry() {
                    style(origin).dim()
                } else {
                    style(origin).cyan()
                };
                println!("{:<56} {}", entry.path, origin);
            }
            println!();
            println!("{} of {} entries", entries.len(), total);
        }
    }
    Ok(())
}
