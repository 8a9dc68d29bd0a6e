//! Get, put and delete - content access through the resolution pipeline

use super::open_engine;
use crate::cli::args::{DeleteArgs, GetArgs, PutArgs};
use crate::config::Config;
use crate::error::{RepodexError, RepodexResult};
use crate::model::StoreKey;
use crate::ui::{self, UiContext};
use std::io::Write;
use tokio::fs;
use tracing::debug;

pub async fn get(args: GetArgs, config: &Config) -> RepodexResult<()> {
    let key: StoreKey = args.store.parse()?;
    let engine = open_engine(config).await?;

    let Some(transfer) = engine.retrieve(&key, &args.path).await? else {
        engine.shutdown().await?;
        return Err(RepodexError::User(format!("Not found: {} in {}", args.path, key)));
    };
    debug!("Serving {} from {}", args.path, transfer.key);
    let data = engine.read(&transfer).await?;

    match args.output {
        Some(path) => {
            fs::write(&path, &data)
                .await
                .map_err(|e| RepodexError::io(format!("writing {}", path.display()), e))?;
            let ctx = UiContext::detect();
            ui::step_ok(
                &ctx,
                &format!("{} bytes from {} written to {}", data.len(), transfer.key, path.display()),
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&data)
                .and_then(|_| stdout.flush())
                .map_err(|e| RepodexError::io("writing to stdout", e))?;
        }
    }

    engine.shutdown().await
}

pub async fn put(args: PutArgs, config: &Config) -> RepodexResult<()> {
    let key: StoreKey = args.store.parse()?;
    let data = fs::read(&args.file)
        .await
        .map_err(|e| RepodexError::io(format!("reading {}", args.file.display()), e))?;

    let engine = open_engine(config).await?;
    let transfer = engine.store(&key, &args.path, &data).await?;
    engine.shutdown().await?;

    let ctx = UiContext::detect();
    ui::step_ok(&ctx, &format!("Stored {} in {}", transfer.path, transfer.key));
    Ok(())
}

pub async fn delete(args: DeleteArgs, config: &Config) -> RepodexResult<()> {
    let key: StoreKey = args.store.parse()?;
    let engine = open_engine(config).await?;
    let removed = engine.delete(&key, &args.path).await?;
    engine.shutdown().await?;

    let ctx = UiContext::detect();
    if removed {
        ui::step_ok(&ctx, &format!("Deleted {} from {}", args.path, key));
    } else {
        ui::step_warn(&ctx, &format!("Nothing at {} in {}", args.path, key));
    }
    Ok(())
}
