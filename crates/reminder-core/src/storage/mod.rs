mod config;
pub mod slot;

pub use config::{ApiConfig, Config, ServiceTiming, SlotConfig, TimingConfig};
pub use slot::{ChangeOrigin, SlotChange, SlotStore};

use std::path::PathBuf;

/// Returns the data directory for config and slot files.
///
/// `REMINDER_DATA_DIR` wins when set. Otherwise `~/.config/reminder[-dev]/`
/// based on `REMINDER_ENV` (set it to `dev` for the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("REMINDER_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("REMINDER_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("reminder-dev")
            } else {
                base_dir.join("reminder")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
