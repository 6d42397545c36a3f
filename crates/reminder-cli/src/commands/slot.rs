use chrono::{Duration, Utc};
use clap::Args;
use reminder_core::{Notification, NotificationKind, SlotStore, MAX_DISPLAY_SECS};

use super::{describe, load_config};

#[derive(Args)]
pub struct PublishArgs {
    /// Title line
    #[arg(long)]
    title: String,
    /// Body text
    #[arg(long, default_value = "")]
    content: String,
    /// info, success, warning or error
    #[arg(long, default_value = "info")]
    kind: String,
    /// Minutes until the notification expires
    #[arg(long, default_value = "60")]
    ttl_mins: i64,
    /// Seconds on screen (default from config)
    #[arg(long)]
    display_secs: Option<f64>,
    /// Reuse an ID to replace an existing entry
    #[arg(long)]
    id: Option<String>,
    /// Store it switched off
    #[arg(long)]
    inactive: bool,
}

fn open_slot() -> Result<SlotStore, Box<dyn std::error::Error>> {
    Ok(SlotStore::from_config(&load_config()?)?)
}

pub fn publish(args: PublishArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.ttl_mins <= 0 {
        return Err("--ttl-mins must be positive".into());
    }
    let expires_at = Duration::try_minutes(args.ttl_mins)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or("--ttl-mins is too large")?;
    if let Some(secs) = args.display_secs {
        if !(secs > 0.0 && secs <= MAX_DISPLAY_SECS) {
            return Err(format!("--display-secs must be in (0, {MAX_DISPLAY_SECS}]").into());
        }
    }

    let mut notification = Notification::new(args.title, args.content)
        .with_kind(NotificationKind::parse(&args.kind))
        .with_active(!args.inactive)
        .expiring_at(expires_at);
    if let Some(id) = args.id {
        notification = notification.with_id(id);
    }
    if let Some(secs) = args.display_secs {
        notification = notification.with_display_secs(secs);
    }
    let id = notification.require_identity()?.to_string();

    let slot = open_slot()?;
    if slot.upsert(notification)? {
        println!("Notification replaced: {id}");
    } else {
        println!("Notification published: {id}");
    }
    Ok(())
}

pub fn list(json: bool, all: bool) -> Result<(), Box<dyn std::error::Error>> {
    let slot = open_slot()?;
    let now = Utc::now();
    let notifications: Vec<Notification> = slot
        .try_read_all()?
        .into_iter()
        .filter(|n| all || n.is_eligible(now))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&notifications)?);
        return Ok(());
    }
    if notifications.is_empty() {
        println!("No notifications.");
        return Ok(());
    }
    for n in &notifications {
        let state = if n.is_eligible(now) { "live" } else { "off " };
        println!("{state} {}", describe(n));
    }
    Ok(())
}

pub fn remove(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if open_slot()?.remove(id)? {
        println!("Notification removed: {id}");
        Ok(())
    } else {
        Err(format!("notification not found: {id}").into())
    }
}

pub fn clear() -> Result<(), Box<dyn std::error::Error>> {
    open_slot()?.clear()?;
    println!("Slot cleared.");
    Ok(())
}
