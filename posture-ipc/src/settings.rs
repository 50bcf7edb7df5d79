//! User configuration shared by the daemon, the CLI and the popup.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_INTERVAL_MINUTES: u32 = 5;
pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 180;
pub const DEFAULT_CATEGORIES: [&str; 6] = ["neck", "shoulder", "back", "wrist", "eye", "arm"];

const DEFAULT_WORK_START: &str = "09:00";
const DEFAULT_WORK_END: &str = "18:00";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(alias = "interval", deserialize_with = "lenient_interval")]
    pub interval_minutes: u32,
    #[serde(alias = "notifications", deserialize_with = "bool_or_true")]
    pub notifications_enabled: bool,
    #[serde(alias = "exercises", deserialize_with = "bool_or_true")]
    pub exercises_enabled: bool,
    pub language: Language,
    #[serde(deserialize_with = "lenient_categories")]
    pub categories: BTreeMap<String, bool>,
    #[serde(deserialize_with = "bool_or_false")]
    pub work_hours_only: bool,
    #[serde(deserialize_with = "work_start_or_default")]
    pub work_start: String,
    #[serde(deserialize_with = "work_end_or_default")]
    pub work_end: String,
    #[serde(deserialize_with = "bool_or_false")]
    pub timer_started: bool,
    #[serde(deserialize_with = "bool_or_false")]
    pub is_paused: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            notifications_enabled: true,
            exercises_enabled: true,
            language: Language::En,
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|c| (c.to_string(), true))
                .collect(),
            work_hours_only: false,
            work_start: DEFAULT_WORK_START.to_string(),
            work_end: DEFAULT_WORK_END.to_string(),
            timer_started: false,
            is_paused: false,
        }
    }
}

impl Settings {
    /// Clamp everything that has a valid range. Applied on every write.
    pub fn normalized(mut self) -> Self {
        self.interval_minutes = clamp_interval(self.interval_minutes);
        self
    }

    pub fn interval_ms(&self) -> i64 {
        i64::from(clamp_interval(self.interval_minutes)) * 60_000
    }

    /// Categories missing from the map count as enabled.
    pub fn category_enabled(&self, category: &str) -> bool {
        self.categories.get(category).copied().unwrap_or(true)
    }

    pub fn work_hours(&self) -> WorkHours {
        WorkHours::from_strings(&self.work_start, &self.work_end)
    }
}

fn clamp_interval(minutes: u32) -> u32 {
    minutes.clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES)
}

fn lenient_interval<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let minutes = match value.as_f64() {
        Some(m) if m.is_finite() => m
            .round()
            .clamp(f64::from(MIN_INTERVAL_MINUTES), f64::from(MAX_INTERVAL_MINUTES))
            as u32,
        _ => DEFAULT_INTERVAL_MINUTES,
    };
    Ok(minutes)
}

// A wrong-typed field falls back to its own default; it never takes the
// rest of the record down with it.

fn loose_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Some(true),
            "false" | "0" | "off" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn bool_or_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_bool(&Value::deserialize(deserializer)?).unwrap_or(true))
}

fn bool_or_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_bool(&Value::deserialize(deserializer)?).unwrap_or(false))
}

fn lenient_categories<'de, D>(deserializer: D) -> Result<BTreeMap<String, bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .iter()
            .filter_map(|(name, on)| loose_bool(on).map(|on| (name.clone(), on)))
            .collect(),
        _ => Settings::default().categories,
    })
}

fn time_or<'de, D>(deserializer: D, fallback: &str) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => fallback.to_string(),
    })
}

fn work_start_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    time_or(deserializer, DEFAULT_WORK_START)
}

fn work_end_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    time_or(deserializer, DEFAULT_WORK_END)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ko,
}

impl Language {
    /// Unknown codes fall back to English.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "ko" | "kr" => Language::Ko,
            _ => Language::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Language::En => Language::Ko,
            Language::Ko => Language::En,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Language::from_code).unwrap_or_default())
    }
}

/// Parse "HH:MM" into minutes since midnight.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

/// Daily window in minutes since midnight. `end < start` wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkHours {
    pub start: u32,
    pub end: u32,
}

impl WorkHours {
    /// Malformed bounds are replaced by the default 09:00-18:00 bounds.
    pub fn from_strings(start: &str, end: &str) -> Self {
        let fallback = |s: &str, default: &str| {
            parse_hhmm(s)
                .or_else(|| parse_hhmm(default))
                .unwrap_or_default()
        };
        Self {
            start: fallback(start, DEFAULT_WORK_START),
            end: fallback(end, DEFAULT_WORK_END),
        }
    }

    /// Both bounds are inclusive.
    pub fn contains(&self, minute_of_day: u32) -> bool {
        if self.end < self.start {
            minute_of_day >= self.start || minute_of_day <= self.end
        } else {
            minute_of_day >= self.start && minute_of_day <= self.end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> u32 {
        parse_hhmm(s).expect("valid time")
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let hours = WorkHours::from_strings("22:00", "06:00");
        assert!(hours.contains(at("23:00")));
        assert!(hours.contains(at("02:00")));
        assert!(!hours.contains(at("12:00")));
    }

    #[test]
    fn day_window_bounds_are_inclusive() {
        let hours = WorkHours::from_strings("09:00", "18:00");
        assert!(!hours.contains(at("08:59")));
        assert!(hours.contains(at("09:00")));
        assert!(hours.contains(at("18:00")));
        assert!(!hours.contains(at("18:01")));
    }

    #[test]
    fn malformed_bounds_use_defaults() {
        assert_eq!(parse_hhmm("25:00"), None);
        assert_eq!(parse_hhmm("9h30"), None);
        assert_eq!(parse_hhmm("07:05"), Some(425));
        let hours = WorkHours::from_strings("late", "18:00");
        assert_eq!(hours, WorkHours { start: 540, end: 1080 });
    }

    #[test]
    fn partial_record_merges_with_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"interval": 30, "language": "ko", "timerStarted": true}"#)
                .expect("settings");
        assert_eq!(settings.interval_minutes, 30);
        assert_eq!(settings.language, Language::Ko);
        assert!(settings.timer_started);
        assert!(!settings.is_paused);
        assert!(settings.notifications_enabled);
        assert_eq!(settings.work_start, "09:00");
        assert_eq!(settings.categories.len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn wrong_typed_fields_fall_back_one_by_one() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "timerStarted": true,
                "workHoursOnly": "true",
                "notificationsEnabled": null,
                "exercisesEnabled": "maybe",
                "isPaused": 0,
                "workStart": 900,
                "workEnd": "17:30",
                "categories": {"neck": false, "eye": "off", "arm": [1]}
            }"#,
        )
        .expect("settings");
        assert!(settings.timer_started);
        assert!(settings.work_hours_only);
        assert!(settings.notifications_enabled);
        assert!(settings.exercises_enabled);
        assert!(!settings.is_paused);
        assert_eq!(settings.work_start, "09:00");
        assert_eq!(settings.work_end, "17:30");
        assert!(!settings.category_enabled("neck"));
        assert!(!settings.category_enabled("eye"));
        assert!(settings.category_enabled("arm"));
    }

    #[test]
    fn interval_is_clamped_on_read() {
        let high: Settings = serde_json::from_str(r#"{"intervalMinutes": 600}"#).expect("settings");
        assert_eq!(high.interval_minutes, 180);
        let low: Settings = serde_json::from_str(r#"{"intervalMinutes": 0}"#).expect("settings");
        assert_eq!(low.interval_minutes, 1);
        let junk: Settings = serde_json::from_str(r#"{"intervalMinutes": "soon"}"#).expect("settings");
        assert_eq!(junk.interval_minutes, DEFAULT_INTERVAL_MINUTES);
    }

    #[test]
    fn interval_is_clamped_on_write() {
        let settings = Settings {
            interval_minutes: 1000,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(settings.interval_minutes, 180);
        assert_eq!(settings.interval_ms(), 180 * 60_000);
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let settings: Settings = serde_json::from_str(r#"{"language": "fr"}"#).expect("settings");
        assert_eq!(settings.language, Language::En);
        assert_eq!(serde_json::to_string(&Language::Ko).expect("encode"), "\"ko\"");
    }

    #[test]
    fn unknown_category_counts_as_enabled() {
        let mut settings = Settings::default();
        settings.categories.insert("back".into(), false);
        assert!(!settings.category_enabled("back"));
        assert!(settings.category_enabled("neck"));
        assert!(settings.category_enabled("legs"));
    }
}
