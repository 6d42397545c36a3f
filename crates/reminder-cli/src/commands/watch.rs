use clap::Args;
use reminder_core::{
    DisplaySurface, HttpSource, Intent, NotificationSource, NullSurface, OfflineSource,
    ReminderService, ServiceTiming, Slide, SlotStore,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use super::load_config;

#[derive(Args)]
pub struct WatchArgs {
    /// Print every event as a JSON line instead of drawing notifications
    #[arg(long)]
    json: bool,
    /// Ignore the API and follow the slot only
    #[arg(long)]
    offline: bool,
}

/// Draws the current slide on stdout.
#[derive(Default)]
struct TerminalSurface {
    showing: bool,
}

impl DisplaySurface for TerminalSurface {
    fn render(&mut self, slide: Option<&Slide>) {
        match slide {
            Some(slide) => {
                println!("{}", format_slide(slide));
                self.showing = true;
            }
            None if self.showing => {
                println!("--");
                self.showing = false;
            }
            None => {}
        }
    }
}

fn format_slide(slide: &Slide) -> String {
    let n = &slide.notification;
    let mut out = format!("{} {}", n.kind.badge(), n.title);
    if slide.total > 1 {
        out.push_str(&format!("  ({}/{})", slide.index + 1, slide.total));
    }
    if !n.content.is_empty() {
        out.push_str(&format!("\n    {}", n.content));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Intent(Intent),
    Refresh,
    DeepCheck,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    match line.trim().to_lowercase().as_str() {
        "n" | "next" => Some(Input::Intent(Intent::Next)),
        "p" | "prev" | "previous" => Some(Input::Intent(Intent::Previous)),
        "c" | "close" => Some(Input::Intent(Intent::Close)),
        "r" | "refresh" => Some(Input::Refresh),
        "d" | "deep" => Some(Input::DeepCheck),
        "q" | "quit" | "exit" => Some(Input::Quit),
        _ => None,
    }
}

pub fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let slot = SlotStore::from_config(&config)?;
    let timing = config.timing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    if args.offline || !config.api.enabled {
        tracing::info!(slot = %slot.path().display(), "watching slot only");
        runtime.block_on(serve(OfflineSource, slot, timing, args.json))
    } else {
        let source = HttpSource::new(&config.api)?;
        tracing::info!(api = %source.snapshot_url(), slot = %slot.path().display(), "watching");
        runtime.block_on(serve(source, slot, timing, args.json))
    }
}

async fn serve<S: NotificationSource>(
    source: S,
    slot: SlotStore,
    timing: ServiceTiming,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        run_loop(ReminderService::new(source, slot, NullSurface, timing), true).await
    } else {
        run_loop(
            ReminderService::new(source, slot, TerminalSurface::default(), timing),
            false,
        )
        .await
    }
}

async fn run_loop<S: NotificationSource, D: DisplaySurface>(
    service: ReminderService<S, D>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = service.subscribe();
    let handle = service.spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome: Result<(), Box<dyn std::error::Error>> = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_input(&line) {
                    Some(Input::Intent(intent)) => {
                        handle.intent(intent);
                    }
                    Some(Input::Refresh) => {
                        handle.refresh();
                    }
                    Some(Input::DeepCheck) => {
                        handle.deep_check();
                    }
                    Some(Input::Quit) => break Ok(()),
                    None if line.trim().is_empty() => {}
                    None => eprintln!("unknown input '{}' (n, p, c, r, d, q)", line.trim()),
                },
                // Keep running without a keyboard; Ctrl-C still stops us.
                Ok(None) => stdin_open = false,
                Err(e) => break Err(e.into()),
            },
            event = events.recv() => match event {
                Ok(event) if json => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => break Err(e.into()),
                },
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    handle.shutdown().await;
    outcome
}
