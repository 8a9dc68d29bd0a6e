//! Status lines

use super::UiContext;
use console::style;

pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.is_interactive() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("{} {}", style("[OK]").green(), message);
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::log::success(message).ok();
    } else {
        println!("  {} {}", style("[OK]").green(), message);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::log::info(message).ok();
    } else {
        println!("  {} {}", style("[INFO]").cyan(), message);
    }
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::log::warning(message).ok();
    } else {
        println!("  {} {}", style("[WARN]").yellow(), message);
    }
}

/// Warning followed by what to do about it
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.is_interactive() {
        cliclack::log::warning(format!("{} - {}", message, style(hint).dim())).ok();
    } else {
        println!("  {} {} - {}", style("[WARN]").yellow(), message, hint);
    }
}

pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.is_interactive() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}
