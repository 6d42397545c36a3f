pub mod config;
pub mod fetch;
pub mod slot;
pub mod watch;

use reminder_core::{Config, Notification};

/// One human-readable line per notification.
pub(crate) fn describe(notification: &Notification) -> String {
    let id = notification.identity().unwrap_or("-");
    let expires = notification
        .expires_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never valid".to_string());
    format!(
        "{} {}  {}  (id: {id}, expires: {expires})",
        notification.kind.badge(),
        notification.title,
        notification.content,
    )
}

/// Config from disk. A broken file is reported, not silently replaced.
pub(crate) fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    Ok(Config::load()?)
}
