use std::io::Write;

use anyhow::Result;
use colored::Colorize;
use tracing::{info, warn};

use crate::progress::{ReferenceInstant, quarter_start_percent};
use crate::settings::{NotificationStyle, Settings, SettingsStore};

pub const TITLE_PREFIX: &str = "Memento Mori: ";

/// (first month, quarter number)
const QUARTER_STARTS: [(u32, u32); 4] = [(1, 1), (4, 2), (7, 3), (10, 4)];

/// One calendar occurrence of a notifiable event.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Milestone {
    QuarterStart { year: i32, quarter: u32 },
    Birthday { year: i32 },
}

impl Milestone {
    /// Stable key recorded in `notified-milestones`.
    pub fn key(&self) -> String {
        match self {
            Milestone::QuarterStart { year, quarter } => format!("quarterly-{year}-Q{quarter}"),
            Milestone::Birthday { year } => format!("birthday-{year}"),
        }
    }

    pub fn title(&self) -> String {
        match self {
            Milestone::QuarterStart { quarter, .. } => format!("Q{quarter} starts!"),
            Milestone::Birthday { .. } => "Happy Birthday! 🎂".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Milestone::QuarterStart { year, quarter } => {
                let month = (quarter - 1) * 3 + 1;
                format!("{}% of {year} complete.", quarter_start_percent(month))
            }
            Milestone::Birthday { .. } => "Wishing you a wonderful day!".to_string(),
        }
    }
}

/// Milestones falling on the instant's date that the settings opt into,
/// whether or not they were already delivered.
pub fn due_milestones(instant: ReferenceInstant, settings: &Settings) -> Vec<Milestone> {
    let mut due = Vec::new();
    if !settings.enable_notifications {
        return due;
    }
    let (year, month, day) = (instant.year(), instant.month(), instant.day());

    if settings.notify_quarterly {
        for (start_month, quarter) in QUARTER_STARTS {
            if month == start_month && day == 1 {
                due.push(Milestone::QuarterStart { year, quarter });
            }
        }
    }

    if settings.notify_birthday
        && let Some(birthday) = settings.birth().anniversary()
        && birthday.month == month
        && birthday.day == day
    {
        due.push(Milestone::Birthday { year });
    }
    due
}

pub trait Notifier: Send {
    fn notify(&mut self, style: NotificationStyle, title: &str, body: &str) -> Result<()>;
}

/// Prints notifications as single lines; prominent ones are emphasised.
pub struct TerminalNotifier<W: Write + Send> {
    out: W,
    color: bool,
}

impl<W: Write + Send> TerminalNotifier<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Notifier for TerminalNotifier<W> {
    fn notify(&mut self, style: NotificationStyle, title: &str, body: &str) -> Result<()> {
        let line = format!("🔔 {title} {body}");
        match style {
            NotificationStyle::Prominent if self.color => {
                writeln!(self.out, "{}", line.bold().bright_white().on_blue())?
            }
            NotificationStyle::Prominent => writeln!(self.out, "{}", line.to_uppercase())?,
            NotificationStyle::Subtle => writeln!(self.out, "{line}")?,
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Delivers every due milestone not yet recorded, then records the delivered
/// keys through the store so each occurrence fires at most once. A failed
/// delivery is logged and left unrecorded for the next check.
pub fn check_notifications(
    store: &mut SettingsStore,
    notifier: &mut dyn Notifier,
    instant: ReferenceInstant,
) -> Result<Vec<Milestone>> {
    let settings = store.settings();
    let style = settings.notification_style;
    let pending: Vec<Milestone> = due_milestones(instant, settings)
        .into_iter()
        .filter(|milestone| !settings.notified_milestones.contains(&milestone.key()))
        .collect();

    let mut delivered = Vec::with_capacity(pending.len());
    for milestone in pending {
        let key = milestone.key();
        let title = format!("{TITLE_PREFIX}{}", milestone.title());
        if let Err(err) = notifier.notify(style, &title, &milestone.body()) {
            warn!(%key, error = %err, "notification delivery failed");
            continue;
        }
        info!(%key, "milestone notified");
        delivered.push(milestone);
    }

    if !delivered.is_empty() {
        store.update(|settings| {
            for milestone in &delivered {
                settings.notified_milestones.insert(milestone.key());
            }
        })?;
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use anyhow::bail;
    use chrono::NaiveDate;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> ReferenceInstant {
        ReferenceInstant::from_local(
            NaiveDate::from_ymd_opt(y, m, d)
                .expect("date")
                .and_hms_opt(h, 0, 0)
                .expect("time"),
        )
    }

    fn notifying_settings() -> Settings {
        Settings {
            enable_notifications: true,
            birth_year: 1990,
            birth_month: 4,
            birth_day: 1,
            configured: true,
            ..Settings::default()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Vec<(NotificationStyle, String, String)>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&mut self, style: NotificationStyle, title: &str, body: &str) -> Result<()> {
            self.sent.push((style, title.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn notify(&mut self, _: NotificationStyle, _: &str, _: &str) -> Result<()> {
            bail!("notification daemon unavailable")
        }
    }

    #[test]
    fn milestone_keys_use_literal_formats() {
        assert_eq!(
            Milestone::QuarterStart {
                year: 2024,
                quarter: 3
            }
            .key(),
            "quarterly-2024-Q3"
        );
        assert_eq!(Milestone::Birthday { year: 2025 }.key(), "birthday-2025");
    }

    #[test]
    fn second_quarter_body_reports_quarter_percent() {
        let milestone = Milestone::QuarterStart {
            year: 2024,
            quarter: 2,
        };
        assert_eq!(milestone.title(), "Q2 starts!");
        assert_eq!(milestone.body(), "25% of 2024 complete.");
    }

    #[test]
    fn quarter_start_and_birthday_can_coincide() {
        let due = due_milestones(at(2024, 4, 1, 9), &notifying_settings());
        assert_eq!(
            due,
            vec![
                Milestone::QuarterStart {
                    year: 2024,
                    quarter: 2
                },
                Milestone::Birthday { year: 2024 },
            ]
        );
    }

    #[test]
    fn nothing_is_due_on_ordinary_days_or_when_disabled() {
        assert!(due_milestones(at(2024, 4, 2, 9), &notifying_settings()).is_empty());

        let mut settings = notifying_settings();
        settings.enable_notifications = false;
        assert!(due_milestones(at(2024, 4, 1, 9), &settings).is_empty());
    }

    #[test]
    fn birthday_needs_month_and_day() {
        let mut settings = notifying_settings();
        settings.notify_quarterly = false;
        settings.birth_day = 0;
        assert!(due_milestones(at(2024, 4, 1, 9), &settings).is_empty());
    }

    #[test]
    fn milestones_fire_at_most_once() {
        let mut store = SettingsStore::new(notifying_settings());
        let mut notifier = RecordingNotifier::default();

        let first = check_notifications(&mut store, &mut notifier, at(2024, 4, 1, 9)).expect("check");
        assert_eq!(first.len(), 2);
        let second =
            check_notifications(&mut store, &mut notifier, at(2024, 4, 1, 18)).expect("check");
        assert!(second.is_empty());

        assert_eq!(notifier.sent.len(), 2);
        assert_eq!(notifier.sent[0].1, "Memento Mori: Q2 starts!");
        assert!(store.settings().notified_milestones.contains("quarterly-2024-Q2"));
        assert!(store.settings().notified_milestones.contains("birthday-2024"));

        let next_year =
            check_notifications(&mut store, &mut notifier, at(2025, 4, 1, 9)).expect("check");
        assert_eq!(next_year.len(), 2);
    }

    #[test]
    fn failed_delivery_is_retried_later() {
        let mut store = SettingsStore::new(notifying_settings());
        let delivered =
            check_notifications(&mut store, &mut FailingNotifier, at(2024, 7, 1, 9)).expect("check");
        assert!(delivered.is_empty());
        assert!(store.settings().notified_milestones.is_empty());

        let mut notifier = RecordingNotifier::default();
        let retried =
            check_notifications(&mut store, &mut notifier, at(2024, 7, 1, 10)).expect("check");
        assert_eq!(
            retried,
            vec![Milestone::QuarterStart {
                year: 2024,
                quarter: 3
            }]
        );
    }

    #[test]
    fn terminal_notifier_marks_prominent_style() {
        let mut notifier = TerminalNotifier::new(Vec::new(), false);
        notifier
            .notify(NotificationStyle::Subtle, "Memento Mori: Q1 starts!", "0% of 2025 complete.")
            .expect("subtle");
        notifier
            .notify(NotificationStyle::Prominent, "Memento Mori: Q1 starts!", "0% of 2025 complete.")
            .expect("prominent");
        let output = String::from_utf8(notifier.into_inner()).expect("utf8");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "🔔 Memento Mori: Q1 starts! 0% of 2025 complete.");
        assert_eq!(lines[1], "🔔 MEMENTO MORI: Q1 STARTS! 0% OF 2025 COMPLETE.");
    }
}
