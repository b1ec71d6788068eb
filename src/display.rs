use std::io::Write;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::progress::{
    ProgressReport, ReferenceInstant, Scale, ScaleProgress, compute_report,
    days_until_next_occurrence,
};
use crate::settings::{
    CountdownKind, DropdownFormat, PanelFormat, PanelPosition, Settings, SettingsStore,
};

pub const PANEL_PREFIX: &str = "⏳";
pub const UNCONFIGURED_PANEL_TEXT: &str = "⏳ memento mori.";
pub const UNCONFIGURED_HINT: &str = "Set your birth year and enable tracking in settings";
pub const BIRTH_DATE_MISSING_TEXT: &str = "🎂 Set your birth month and day to see a countdown";
pub const SEGMENT_SEPARATOR: &str = " · ";
pub const PROGRESS_BAR_WIDTH: usize = 10;
const PANEL_WIDTH: usize = 80;

pub fn symbol(scale: Scale) -> &'static str {
    match scale {
        Scale::Day => "𝗗",
        Scale::Week => "𝗪",
        Scale::Month => "𝗠",
        Scale::Year => "𝗬",
        Scale::Life => "𝗟",
    }
}

pub fn title(scale: Scale) -> &'static str {
    match scale {
        Scale::Day => "Day",
        Scale::Week => "Week",
        Scale::Month => "Month",
        Scale::Year => "Year",
        Scale::Life => "Life",
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ColorBand {
    Green,
    Yellow,
    Red,
}

pub fn life_band(percent: i64) -> ColorBand {
    if percent <= 33 {
        ColorBand::Green
    } else if percent <= 66 {
        ColorBand::Yellow
    } else {
        ColorBand::Red
    }
}

pub fn day_band(percent: i64) -> ColorBand {
    if percent <= 50 {
        ColorBand::Green
    } else if percent <= 75 {
        ColorBand::Yellow
    } else {
        ColorBand::Red
    }
}

/// Band for `scale`, if colour coding is switched on for it.
pub fn band_for(scale: Scale, percent: i64, settings: &Settings) -> Option<ColorBand> {
    match scale {
        Scale::Life if settings.color_code_life => Some(life_band(percent)),
        Scale::Day if settings.color_code_day => Some(day_band(percent)),
        _ => None,
    }
}

/// Fixed-width glyph bar, e.g. `▓▓▓▓▓▓░░░░` for 65% over ten cells.
pub fn progress_bar(percent: i64, width: usize) -> String {
    let ratio = percent.clamp(0, 100) as f64 / 100.0;
    let filled = ((ratio * width as f64).round() as usize).min(width);
    format!("{}{}", "▓".repeat(filled), "░".repeat(width - filled))
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PanelSegment {
    pub scale: Scale,
    pub text: String,
    pub band: Option<ColorBand>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PanelText {
    Unconfigured { hint: String },
    Progress(Vec<PanelSegment>),
}

impl PanelText {
    pub fn plain(&self) -> String {
        match self {
            PanelText::Unconfigured { .. } => UNCONFIGURED_PANEL_TEXT.to_string(),
            PanelText::Progress(segments) => {
                let joined = segments
                    .iter()
                    .map(|segment| segment.text.as_str())
                    .collect::<Vec<_>>()
                    .join(SEGMENT_SEPARATOR);
                format!("{PANEL_PREFIX} {joined}")
            }
        }
    }

    pub fn styled(&self) -> String {
        match self {
            PanelText::Unconfigured { .. } => self.plain(),
            PanelText::Progress(segments) => {
                let joined = segments
                    .iter()
                    .map(|segment| paint(&segment.text, segment.band))
                    .collect::<Vec<_>>()
                    .join(SEGMENT_SEPARATOR);
                format!("{PANEL_PREFIX} {joined}")
            }
        }
    }
}

fn paint(text: &str, band: Option<ColorBand>) -> String {
    match band {
        Some(ColorBand::Green) => text.green().to_string(),
        Some(ColorBand::Yellow) => text.yellow().to_string(),
        Some(ColorBand::Red) => text.red().to_string(),
        None => text.to_string(),
    }
}

pub fn panel_segment(scale: Scale, progress: &ScaleProgress, settings: &Settings) -> PanelSegment {
    let text = match settings.panel_format {
        PanelFormat::Percentage if settings.shows_time_left(scale) => format!(
            "{} {}% ({})",
            symbol(scale),
            progress.percent,
            progress.remaining_label
        ),
        PanelFormat::Percentage => format!("{} {}%", symbol(scale), progress.percent),
        PanelFormat::TimeLeft => format!("{} {}", symbol(scale), progress.remaining_short()),
    };
    PanelSegment {
        scale,
        text,
        band: band_for(scale, progress.percent, settings),
    }
}

pub fn render_panel(report: Option<&ProgressReport>, settings: &Settings) -> PanelText {
    let Some(report) = report.filter(|_| settings.is_tracking()) else {
        return PanelText::Unconfigured {
            hint: UNCONFIGURED_HINT.to_string(),
        };
    };
    let segments = Scale::ALL
        .into_iter()
        .filter(|scale| settings.is_visible(*scale))
        .filter_map(|scale| {
            report
                .get(scale)
                .map(|progress| panel_segment(scale, progress, settings))
        })
        .collect();
    PanelText::Progress(segments)
}

pub fn dropdown_value(progress: &ScaleProgress, format: DropdownFormat) -> String {
    match format {
        DropdownFormat::Percentage => format!("{}%", progress.percent),
        DropdownFormat::Ratio => progress.ratio_label.clone(),
        DropdownFormat::TimeLeft => progress.remaining_label.clone(),
    }
}

/// Countdown row for the configured event, or `None` when no countdown is
/// selected. A birthday countdown without month and day set yields a prompt
/// instead of a day count.
pub fn countdown_text(settings: &Settings, instant: ReferenceInstant) -> Option<String> {
    match settings.countdown_type {
        CountdownKind::None => None,
        CountdownKind::Birthday => {
            let Some(target) = settings.birth().anniversary() else {
                return Some(BIRTH_DATE_MISSING_TEXT.to_string());
            };
            let text = match days_until_next_occurrence(target, instant) {
                0 => "🎂 Happy birthday!".to_string(),
                1 => "🎂 1 day until your birthday".to_string(),
                days => format!("🎂 {days} days until your birthday"),
            };
            Some(text)
        }
        CountdownKind::CustomEvent => {
            let days = days_until_next_occurrence(settings.custom_event(), instant);
            let template = settings.custom_event_text.trim();
            if template.is_empty() {
                Some(format!("{}: {days} days", settings.custom_event_name))
            } else {
                Some(template.replace("{days}", &days.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MenuAction {
    Refresh,
    OpenSettings,
}

impl MenuAction {
    pub fn label(self) -> &'static str {
        match self {
            MenuAction::Refresh => "Refresh",
            MenuAction::OpenSettings => "Settings",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MenuItem {
    Toggle {
        scale: Scale,
        checked: bool,
        bar: String,
        value: String,
    },
    StaticRow {
        text: String,
    },
    ActionRow {
        action: MenuAction,
    },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MenuOutcome {
    Toggled { scale: Scale, visible: bool },
    Ignored,
    Action(MenuAction),
}

pub fn build_menu(
    report: Option<&ProgressReport>,
    settings: &Settings,
    countdown: Option<String>,
) -> Vec<MenuItem> {
    let mut items = Vec::new();
    match report.filter(|_| settings.is_tracking()) {
        Some(report) => {
            for (scale, progress) in report.iter() {
                items.push(MenuItem::Toggle {
                    scale,
                    checked: settings.is_visible(scale),
                    bar: progress_bar(progress.percent, PROGRESS_BAR_WIDTH),
                    value: dropdown_value(progress, settings.dropdown_format),
                });
            }
        }
        None => items.push(MenuItem::StaticRow {
            text: UNCONFIGURED_HINT.to_string(),
        }),
    }
    if let Some(text) = countdown {
        items.push(MenuItem::StaticRow { text });
    }
    items.push(MenuItem::ActionRow {
        action: MenuAction::Refresh,
    });
    items.push(MenuItem::ActionRow {
        action: MenuAction::OpenSettings,
    });
    items
}

/// Activates a menu row. Toggles flip the scale's panel visibility through
/// the store; static rows do nothing; action rows hand their action back.
pub fn dispatch(item: &MenuItem, store: &mut SettingsStore) -> Result<MenuOutcome> {
    match item {
        MenuItem::Toggle { scale, .. } => {
            let scale = *scale;
            let visible = !store.settings().is_visible(scale);
            store
                .update(|settings| settings.set_visible(scale, visible))
                .with_context(|| format!("failed to toggle {} visibility", scale.key()))?;
            Ok(MenuOutcome::Toggled { scale, visible })
        }
        MenuItem::StaticRow { .. } => Ok(MenuOutcome::Ignored),
        MenuItem::ActionRow { action } => Ok(MenuOutcome::Action(*action)),
    }
}

/// Everything one render pass shows, derived from a single instant.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IndicatorView {
    pub instant: ReferenceInstant,
    pub position: PanelPosition,
    pub panel: PanelText,
    pub menu: Vec<MenuItem>,
}

pub fn build_view(settings: &Settings, instant: ReferenceInstant) -> IndicatorView {
    let report = settings
        .is_tracking()
        .then(|| compute_report(instant, settings.birth(), settings.life_expectancy));
    let countdown = countdown_text(settings, instant);
    IndicatorView {
        instant,
        position: settings.panel_position,
        panel: render_panel(report.as_ref(), settings),
        menu: build_menu(report.as_ref(), settings, countdown),
    }
}

pub trait Renderer: Send {
    fn render(&mut self, view: &IndicatorView) -> Result<()>;
}

/// Writes the panel line, and optionally the menu rows, to a terminal stream.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    color: bool,
    show_menu: bool,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W, color: bool, show_menu: bool) -> Self {
        Self {
            out,
            color,
            show_menu,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, view: &IndicatorView) -> Result<()> {
        write_view(&mut self.out, view, self.color, self.show_menu)?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn write_view<W: Write>(
    out: &mut W,
    view: &IndicatorView,
    color: bool,
    show_menu: bool,
) -> Result<()> {
    let plain = view.panel.plain();
    let text = if color { view.panel.styled() } else { plain.clone() };
    let padding = match view.position {
        PanelPosition::Left => 0,
        PanelPosition::Center => PANEL_WIDTH.saturating_sub(plain.chars().count()) / 2,
        PanelPosition::Right => PANEL_WIDTH.saturating_sub(plain.chars().count()),
    };
    writeln!(out, "{}{text}", " ".repeat(padding))?;
    if !show_menu {
        if let PanelText::Unconfigured { hint } = &view.panel {
            writeln!(out, "{}{hint}", " ".repeat(padding))?;
        }
        return Ok(());
    }

    for item in &view.menu {
        match item {
            MenuItem::Toggle {
                scale,
                checked,
                bar,
                value,
            } => {
                let check = if *checked { "[x]" } else { "[ ]" };
                writeln!(
                    out,
                    "  {check} {} {:<5}  {bar}  {value}",
                    symbol(*scale),
                    title(*scale)
                )?;
            }
            MenuItem::StaticRow { text } => writeln!(out, "      {text}")?,
            MenuItem::ActionRow { action } => writeln!(out, "  > {}", action.label())?,
        }
    }
    Ok(())
}
