mod clock;
mod display;
mod indicator;
mod notify;
mod progress;
mod settings;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tracing::{Level, debug, warn};

use crate::clock::{Clock, FixedClock, SystemClock};
use crate::display::{
    MenuAction, MenuItem, MenuOutcome, TerminalRenderer, build_view, dispatch, write_view,
};
use crate::indicator::IndicatorConfig;
use crate::notify::TerminalNotifier;
use crate::progress::calendar::days_in_month;
use crate::progress::{EventTarget, Scale, compute_report, days_until_next_occurrence};
use crate::settings::SettingsStore;

#[derive(Parser, Debug)]
#[command(
    name = "memento-mori",
    version,
    about = "Day, week, month, year and life progress in your terminal"
)]
struct Cli {
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Pin the reference instant (local wall clock, YYYY-MM-DDTHH:MM:SS).
    #[arg(long)]
    at: Option<String>,

    /// Print the panel, menu and countdown once, then exit.
    #[arg(long)]
    once: bool,

    /// With --once, print the progress report as JSON.
    #[arg(long, requires = "once")]
    json: bool,

    /// Print days until the next MM-DD and exit.
    #[arg(long, value_name = "MM-DD")]
    countdown: Option<String>,

    #[arg(long)]
    no_color: bool,

    #[arg(long)]
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let clock: Arc<dyn Clock> = match &cli.at {
        Some(at) => Arc::new(FixedClock::parse(at)?),
        None => Arc::new(SystemClock),
    };
    debug!(clock = clock.label(), "clock selected");

    if let Some(countdown) = &cli.countdown {
        let target = parse_month_day(countdown)?;
        println!("{}", days_until_next_occurrence(target, clock.now()?));
        return Ok(());
    }

    let store = SettingsStore::open(&cli.settings)
        .with_context(|| format!("failed to load {}", cli.settings.display()))?;

    if cli.once {
        return print_once(&store, clock.as_ref(), cli.json, !cli.no_color);
    }
    run_live(store, clock, &cli)
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn print_once(store: &SettingsStore, clock: &dyn Clock, json: bool, color: bool) -> Result<()> {
    let settings = store.settings();
    let instant = clock.now()?;

    if json {
        let mut report = compute_report(instant, settings.birth(), settings.life_expectancy);
        if !settings.is_tracking() {
            report.scales.remove(&Scale::Life);
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let view = build_view(settings, instant);
    let mut stdout = io::stdout().lock();
    write_view(&mut stdout, &view, color, true)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Command {
    Toggle(Scale),
    Action(MenuAction),
    Quit,
}

fn run_live(store: SettingsStore, clock: Arc<dyn Clock>, cli: &Cli) -> Result<()> {
    let color = !cli.no_color;
    let handle = indicator::start(IndicatorConfig {
        clock: Arc::clone(&clock),
        settings: Arc::new(Mutex::new(store)),
        renderer: Box::new(TerminalRenderer::new(io::stdout(), color, true)),
        notifier: Box::new(TerminalNotifier::new(io::stderr(), color)),
    })?;
    let settings = handle.settings();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let Some(command) = parse_command(line.trim()) else {
                continue;
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Command::Quit) => break,
            Ok(command) => match activate(command, &settings, clock.as_ref()) {
                Ok(Some(MenuOutcome::Action(MenuAction::Refresh))) => handle.refresh(),
                Ok(Some(MenuOutcome::Action(MenuAction::OpenSettings))) => {
                    eprintln!("settings file: {}", cli.settings.display());
                }
                Ok(Some(MenuOutcome::Toggled { scale, visible })) => {
                    debug!(scale = scale.key(), visible, "scale toggled");
                }
                Ok(Some(MenuOutcome::Ignored)) => {}
                Ok(None) => warn!(?command, "no such row in the current menu"),
                Err(err) => warn!(error = %format!("{err:#}"), "menu action failed"),
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(Duration::from_millis(200));
            }
        }
    }

    indicator::stop(handle);
    Ok(())
}

/// Single-letter commands read from stdin while the live indicator runs.
fn parse_command(input: &str) -> Option<Command> {
    match input {
        "d" => Some(Command::Toggle(Scale::Day)),
        "w" => Some(Command::Toggle(Scale::Week)),
        "m" => Some(Command::Toggle(Scale::Month)),
        "y" => Some(Command::Toggle(Scale::Year)),
        "l" => Some(Command::Toggle(Scale::Life)),
        "r" => Some(Command::Action(MenuAction::Refresh)),
        "s" => Some(Command::Action(MenuAction::OpenSettings)),
        "q" => Some(Command::Quit),
        _ => None,
    }
}

/// The row of `menu` a command refers to, if the menu currently shows it.
fn find_menu_item(menu: &[MenuItem], command: Command) -> Option<&MenuItem> {
    menu.iter().find(|item| match (item, command) {
        (MenuItem::Toggle { scale, .. }, Command::Toggle(wanted)) => *scale == wanted,
        (MenuItem::ActionRow { action }, Command::Action(wanted)) => *action == wanted,
        _ => false,
    })
}

/// Builds the menu as it stands now and dispatches the row the command names.
/// Returns `None` when the row is not on the menu, e.g. toggles while life
/// tracking is not configured.
fn activate(
    command: Command,
    settings: &Mutex<SettingsStore>,
    clock: &dyn Clock,
) -> Result<Option<MenuOutcome>> {
    let instant = clock.now()?;
    let mut store = settings
        .lock()
        .map_err(|_| anyhow!("failed to lock settings store"))?;
    let view = build_view(store.settings(), instant);
    let Some(item) = find_menu_item(&view.menu, command) else {
        return Ok(None);
    };
    dispatch(item, &mut store).map(Some)
}

fn parse_month_day(input: &str) -> Result<EventTarget> {
    let Some((month, day)) = input.split_once('-') else {
        bail!("invalid date '{input}', expected MM-DD");
    };
    let month: u32 = month
        .parse()
        .with_context(|| format!("invalid month in '{input}'"))?;
    let day: u32 = day
        .parse()
        .with_context(|| format!("invalid day in '{input}'"))?;
    if !(1..=12).contains(&month) {
        bail!("month must be between 1 and 12, got {month}");
    }
    let max_day = days_in_month(month, 2000);
    if !(1..=max_day).contains(&day) {
        bail!("day must be between 1 and {max_day} for month {month}, got {day}");
    }
    Ok(EventTarget::new(month, day))
}
