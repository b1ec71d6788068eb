use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::progress::calendar::days_in_month;
use crate::progress::{BirthRecord, EventTarget, Scale};

pub const SETTINGS_VERSION: u32 = 1;
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 10;
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 300;
pub const MIN_LIFE_EXPECTANCY: u32 = 1;
pub const MAX_LIFE_EXPECTANCY: u32 = 150;
pub const MIN_BIRTH_YEAR: i32 = 1900;
/// Any leap year; month-length bounds for yearly events must admit Feb 29.
const LEAP_REFERENCE_YEAR: i32 = 2000;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelPosition {
    Left,
    Center,
    #[default]
    Right,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelFormat {
    #[default]
    Percentage,
    TimeLeft,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropdownFormat {
    #[default]
    Percentage,
    Ratio,
    TimeLeft,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountdownKind {
    #[default]
    None,
    Birthday,
    CustomEvent,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationStyle {
    #[default]
    Subtle,
    Prominent,
}

/// Flat key-value settings. Serialized key names double as the keys that
/// store subscribers filter on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub update_interval: u64,
    pub panel_position: PanelPosition,
    pub panel_format: PanelFormat,
    pub dropdown_format: DropdownFormat,
    pub color_code_life: bool,
    pub color_code_day: bool,
    pub show_day: bool,
    pub show_week: bool,
    pub show_month: bool,
    pub show_year: bool,
    pub show_life: bool,
    pub show_left_day: bool,
    pub show_left_week: bool,
    pub show_left_month: bool,
    pub show_left_year: bool,
    pub show_left_life: bool,
    pub birth_year: i32,
    pub birth_month: u32,
    pub birth_day: u32,
    pub life_expectancy: u32,
    pub configured: bool,
    pub countdown_type: CountdownKind,
    pub custom_event_name: String,
    pub custom_event_month: u32,
    pub custom_event_day: u32,
    pub custom_event_text: String,
    pub enable_notifications: bool,
    pub notify_quarterly: bool,
    pub notify_birthday: bool,
    pub notification_style: NotificationStyle,
    pub notified_milestones: BTreeSet<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            update_interval: 60,
            panel_position: PanelPosition::default(),
            panel_format: PanelFormat::default(),
            dropdown_format: DropdownFormat::default(),
            color_code_life: false,
            color_code_day: false,
            show_day: true,
            show_week: true,
            show_month: true,
            show_year: true,
            show_life: true,
            show_left_day: false,
            show_left_week: false,
            show_left_month: false,
            show_left_year: false,
            show_left_life: false,
            birth_year: 0,
            birth_month: 0,
            birth_day: 0,
            life_expectancy: 80,
            configured: false,
            countdown_type: CountdownKind::default(),
            custom_event_name: "New Year".to_string(),
            custom_event_month: 1,
            custom_event_day: 1,
            custom_event_text: "🎉 {days} days until New Year".to_string(),
            enable_notifications: false,
            notify_quarterly: true,
            notify_birthday: true,
            notification_style: NotificationStyle::default(),
            notified_milestones: BTreeSet::new(),
        }
    }
}

impl Settings {
    /// Progress is only shown once tracking is enabled and a birth year exists.
    pub fn is_tracking(&self) -> bool {
        self.configured && self.birth_year != 0
    }

    pub fn birth(&self) -> BirthRecord {
        BirthRecord::new(self.birth_year, self.birth_month, self.birth_day)
    }

    pub fn custom_event(&self) -> EventTarget {
        EventTarget::new(self.custom_event_month, self.custom_event_day)
    }

    pub fn is_visible(&self, scale: Scale) -> bool {
        match scale {
            Scale::Day => self.show_day,
            Scale::Week => self.show_week,
            Scale::Month => self.show_month,
            Scale::Year => self.show_year,
            Scale::Life => self.show_life,
        }
    }

    pub fn set_visible(&mut self, scale: Scale, visible: bool) {
        let flag = match scale {
            Scale::Day => &mut self.show_day,
            Scale::Week => &mut self.show_week,
            Scale::Month => &mut self.show_month,
            Scale::Year => &mut self.show_year,
            Scale::Life => &mut self.show_life,
        };
        *flag = visible;
    }

    pub fn shows_time_left(&self, scale: Scale) -> bool {
        match scale {
            Scale::Day => self.show_left_day,
            Scale::Week => self.show_left_week,
            Scale::Month => self.show_left_month,
            Scale::Year => self.show_left_year,
            Scale::Life => self.show_left_life,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.validate_for_year(Local::now().year())
    }

    pub fn validate_for_year(&self, current_year: i32) -> Result<(), SettingsError> {
        check_range(
            "update-interval",
            self.update_interval as i64,
            MIN_UPDATE_INTERVAL_SECS as i64,
            MAX_UPDATE_INTERVAL_SECS as i64,
        )?;
        check_range(
            "life-expectancy",
            i64::from(self.life_expectancy),
            i64::from(MIN_LIFE_EXPECTANCY),
            i64::from(MAX_LIFE_EXPECTANCY),
        )?;
        if self.birth_year != 0 {
            check_range(
                "birth-year",
                i64::from(self.birth_year),
                i64::from(MIN_BIRTH_YEAR),
                i64::from(current_year),
            )?;
        }
        check_range("birth-month", i64::from(self.birth_month), 0, 12)?;
        let birth_month_length = if self.birth_month == 0 {
            31
        } else {
            let year = if self.birth_year == 0 {
                LEAP_REFERENCE_YEAR
            } else {
                self.birth_year
            };
            days_in_month(self.birth_month, year)
        };
        if self.birth_day > birth_month_length {
            return Err(SettingsError::InvalidBirthDay {
                year: self.birth_year,
                month: self.birth_month,
                day: self.birth_day,
            });
        }
        check_range(
            "custom-event-month",
            i64::from(self.custom_event_month),
            1,
            12,
        )?;
        check_range(
            "custom-event-day",
            i64::from(self.custom_event_day),
            1,
            i64::from(days_in_month(self.custom_event_month, LEAP_REFERENCE_YEAR)),
        )?;
        Ok(())
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum SettingsError {
    #[error("{key} must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("birth-day {day} does not exist in month {month} of year {year}")]
    InvalidBirthDay { year: i32, month: u32, day: u32 },
}

fn check_range(key: &'static str, value: i64, min: i64, max: i64) -> Result<(), SettingsError> {
    if value < min || value > max {
        return Err(SettingsError::OutOfRange {
            key,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsFile {
    version: u32,
    #[serde(flatten)]
    settings: Settings,
}

/// Loads settings from `path`; a missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        info!(path = %path.display(), "settings file not found, using defaults");
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read settings file {}", path.display()))?;
    parse_settings_text(&content)
}

pub fn parse_settings_text(content: &str) -> Result<Settings> {
    let raw = serde_json::from_str::<SettingsFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != SETTINGS_VERSION {
        bail!(
            "unsupported settings version {}; expected version {SETTINGS_VERSION}",
            raw.version
        );
    }
    raw.settings.validate()?;
    Ok(raw.settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let payload = SettingsFile {
        version: SETTINGS_VERSION,
        settings: settings.clone(),
    };
    let text = serde_json::to_string_pretty(&payload)?;
    fs::write(path, format!("{text}\n"))
        .with_context(|| format!("unable to write settings file {}", path.display()))?;
    Ok(())
}

/// Which keys a subscriber wants to hear about.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum KeyFilter {
    Any,
    Key(String),
}

impl KeyFilter {
    pub fn key(name: &str) -> Self {
        KeyFilter::Key(name.to_string())
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            KeyFilter::Any => true,
            KeyFilter::Key(wanted) => wanted == key,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SubscriptionId(u64);

type SettingsCallback = Box<dyn Fn(&str, &Settings) + Send>;

struct Subscription {
    id: SubscriptionId,
    filter: KeyFilter,
    callback: SettingsCallback,
}

/// In-process settings store with change notification.
///
/// Callbacks run synchronously inside [`SettingsStore::update`], so they must
/// not try to reach the store again.
pub struct SettingsStore {
    settings: Settings,
    path: Option<PathBuf>,
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            path: None,
            subscriptions: Vec::new(),
            next_id: 0,
        }
    }

    /// Loads from `path` and writes every accepted update back to it.
    pub fn open(path: &Path) -> Result<Self> {
        let settings = load_settings(path)?;
        let mut store = Self::new(settings);
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe<F>(&mut self, filter: KeyFilter, callback: F) -> SubscriptionId
    where
        F: Fn(&str, &Settings) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            filter,
            callback: Box::new(callback),
        });
        id
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        self.subscriptions.len() != before
    }

    /// Applies `mutate` to a copy of the settings, validates and persists the
    /// result, then notifies subscribers once per changed key. Returns the
    /// changed keys. A rejected update leaves the store untouched.
    pub fn update<F>(&mut self, mutate: F) -> Result<Vec<String>>
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = self.settings.clone();
        mutate(&mut next);
        next.validate()?;

        let changed = changed_keys(&self.settings, &next);
        if changed.is_empty() {
            return Ok(changed);
        }
        if let Some(path) = &self.path {
            save_settings(path, &next)?;
        }
        self.settings = next;
        debug!(keys = ?changed, "settings changed");

        for key in &changed {
            for subscription in &self.subscriptions {
                if subscription.filter.matches(key) {
                    (subscription.callback)(key, &self.settings);
                }
            }
        }
        Ok(changed)
    }
}

fn changed_keys(old: &Settings, new: &Settings) -> Vec<String> {
    let (Ok(Value::Object(old)), Ok(Value::Object(new))) =
        (serde_json::to_value(old), serde_json::to_value(new))
    else {
        return Vec::new();
    };
    let mut keys: Vec<String> = new
        .iter()
        .filter(|(key, value)| old.get(key.as_str()) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn parses_partial_settings_with_defaults() {
        let json = r#"
{
  "version": 1,
  "birth-year": 1990,
  "birth-month": 6,
  "birth-day": 15,
  "panel-format": "time-left",
  "dropdown-format": "ratio",
  "countdown-type": "custom-event",
  "notified-milestones": ["quarterly-2024-Q1"]
}
"#;
        let settings = parse_settings_text(json).expect("valid settings");
        assert_eq!(settings.birth(), BirthRecord::new(1990, 6, 15));
        assert_eq!(settings.panel_format, PanelFormat::TimeLeft);
        assert_eq!(settings.dropdown_format, DropdownFormat::Ratio);
        assert_eq!(settings.countdown_type, CountdownKind::CustomEvent);
        assert_eq!(settings.life_expectancy, 80);
        assert_eq!(settings.update_interval, 60);
        assert!(settings.show_life);
        assert!(!settings.show_left_life);
        assert!(settings.notified_milestones.contains("quarterly-2024-Q1"));
    }

    #[test]
    fn rejects_malformed_json_with_position() {
        let err = parse_settings_text("{ \"version\": 1, ").expect_err("should fail");
        assert!(err.to_string().contains("invalid JSON at line"));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = parse_settings_text(r#"{ "version": 7 }"#).expect_err("should fail");
        assert!(err.to_string().contains("unsupported settings version 7"));
    }

    #[test]
    fn rejects_out_of_range_life_expectancy() {
        let err = parse_settings_text(r#"{ "version": 1, "life-expectancy": 151 }"#)
            .expect_err("should fail");
        assert!(err.to_string().contains("life-expectancy must be between 1 and 150"));
    }

    #[test]
    fn update_interval_is_bounded() {
        let mut settings = Settings::default();
        settings.update_interval = 5;
        assert_eq!(
            settings.validate_for_year(2024),
            Err(SettingsError::OutOfRange {
                key: "update-interval",
                value: 5,
                min: 10,
                max: 300,
            })
        );
        settings.update_interval = 300;
        assert!(settings.validate_for_year(2024).is_ok());
    }

    #[test]
    fn birth_day_must_exist_in_birth_month() {
        let mut settings = Settings::default();
        settings.birth_year = 2023;
        settings.birth_month = 2;
        settings.birth_day = 29;
        assert_eq!(
            settings.validate_for_year(2024),
            Err(SettingsError::InvalidBirthDay {
                year: 2023,
                month: 2,
                day: 29,
            })
        );
        settings.birth_year = 2024;
        assert!(settings.validate_for_year(2024).is_ok());
    }

    #[test]
    fn birth_year_cannot_be_in_the_future() {
        let mut settings = Settings::default();
        settings.birth_year = 2030;
        assert!(settings.validate_for_year(2024).is_err());
        settings.birth_year = 0;
        assert!(settings.validate_for_year(2024).is_ok());
    }

    #[test]
    fn custom_event_may_fall_on_leap_day() {
        let mut settings = Settings::default();
        settings.custom_event_month = 2;
        settings.custom_event_day = 29;
        assert!(settings.validate_for_year(2023).is_ok());
        settings.custom_event_day = 30;
        assert!(settings.validate_for_year(2023).is_err());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.birth_year = 1985;
        settings.notification_style = NotificationStyle::Prominent;
        save_settings(&path, &settings).expect("save");

        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"version\": 1"));
        assert!(text.contains("\"notification-style\": \"prominent\""));
        assert_eq!(load_settings(&path).expect("load"), settings);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let settings = load_settings(&dir.path().join("absent.json")).expect("defaults");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn subscribers_hear_matching_keys_only() {
        let mut store = SettingsStore::new(Settings::default());
        let heard_key = Arc::new(Mutex::new(Vec::new()));
        let heard_any = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&heard_key);
        store.subscribe(KeyFilter::key("birth-year"), move |key, settings| {
            sink.lock().expect("lock").push((key.to_string(), settings.birth_year));
        });
        let sink = Arc::clone(&heard_any);
        store.subscribe(KeyFilter::Any, move |key, _| {
            sink.lock().expect("lock").push(key.to_string());
        });

        let changed = store
            .update(|s| {
                s.birth_year = 1990;
                s.show_week = false;
            })
            .expect("update");
        assert_eq!(changed, vec!["birth-year".to_string(), "show-week".to_string()]);
        assert_eq!(
            *heard_key.lock().expect("lock"),
            vec![("birth-year".to_string(), 1990)]
        );
        assert_eq!(
            *heard_any.lock().expect("lock"),
            vec!["birth-year".to_string(), "show-week".to_string()]
        );
    }

    #[test]
    fn unchanged_update_notifies_nobody() {
        let mut store = SettingsStore::new(Settings::default());
        let calls = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&calls);
        store.subscribe(KeyFilter::Any, move |_, _| {
            *sink.lock().expect("lock") += 1;
        });
        let changed = store.update(|s| s.show_day = true).expect("update");
        assert!(changed.is_empty());
        assert_eq!(*calls.lock().expect("lock"), 0);
    }

    #[test]
    fn unsubscribed_callbacks_stop_firing() {
        let mut store = SettingsStore::new(Settings::default());
        let calls = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&calls);
        let id = store.subscribe(KeyFilter::Any, move |_, _| {
            *sink.lock().expect("lock") += 1;
        });
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.update(|s| s.configured = true).expect("update");
        assert_eq!(*calls.lock().expect("lock"), 0);
    }

    #[test]
    fn invalid_update_is_rejected_and_not_applied() {
        let mut store = SettingsStore::new(Settings::default());
        let err = store
            .update(|s| s.life_expectancy = 0)
            .expect_err("should fail");
        assert!(err.to_string().contains("life-expectancy"));
        assert_eq!(store.settings().life_expectancy, 80);
    }

    #[test]
    fn opened_store_persists_updates() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let mut store = SettingsStore::open(&path).expect("open");
        store.update(|s| s.birth_year = 1970).expect("update");
        assert_eq!(load_settings(&path).expect("reload").birth_year, 1970);
    }
}
