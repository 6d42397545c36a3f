use chrono::Utc;
use reminder_core::{HttpSource, NotificationSource, SlotStore, SourceKind};

use super::{describe, load_config};

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let slot = SlotStore::from_config(&config)?;

    let (source, notifications) = if config.api.enabled {
        let remote = HttpSource::new(&config.api)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        match runtime.block_on(remote.fetch_snapshot(Utc::now())) {
            Ok(set) => (SourceKind::Snapshot, set),
            Err(e) => {
                eprintln!("warning: {e}; showing the slot instead");
                (SourceKind::Slot, slot.read_all())
            }
        }
    } else {
        (SourceKind::Slot, slot.read_all())
    };

    if json {
        let out = serde_json::json!({
            "source": source,
            "notifications": notifications,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let now = Utc::now();
    println!("Source: {source:?} ({} notifications)", notifications.len());
    for n in &notifications {
        let state = if n.is_eligible(now) { "live" } else { "off " };
        println!("{state} {}", describe(n));
    }
    Ok(())
}
