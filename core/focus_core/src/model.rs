use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};

pub const DEFAULT_FOCUS_SECONDS: i64 = 25 * 60;
pub const DEFAULT_SHORT_BREAK_SECONDS: i64 = 5 * 60;
pub const DEFAULT_LONG_BREAK_SECONDS: i64 = 30 * 60;
pub const DEFAULT_DAILY_GOAL: i64 = 4;

/// A stored focus session. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    pub duration: i64,
    pub note: Option<String>,
    pub completed: bool,
}

/// Payload of `POST /api/session`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    pub duration: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl NewSession {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.duration < 0 {
            return Err("duration must be >= 0");
        }
        Ok(())
    }

    pub fn into_session(self, id: i64) -> Session {
        Session {
            id,
            start_time: self.start_time,
            duration: self.duration,
            note: self.note,
            completed: self.completed.unwrap_or(false),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

/// The singleton user preferences record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub focus_duration: i64,
    pub short_break_duration: i64,
    pub long_break_duration: i64,
    pub daily_goal: i64,
    pub sound_notifications: bool,
    pub browser_notifications: bool,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_duration: DEFAULT_FOCUS_SECONDS,
            short_break_duration: DEFAULT_SHORT_BREAK_SECONDS,
            long_break_duration: DEFAULT_LONG_BREAK_SECONDS,
            daily_goal: DEFAULT_DAILY_GOAL,
            sound_notifications: true,
            browser_notifications: false,
            theme: Theme::Light,
        }
    }
}

/// Payload of `PUT /api/settings`. Absent fields keep their current value.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub focus_duration: Option<i64>,
    #[serde(default)]
    pub short_break_duration: Option<i64>,
    #[serde(default)]
    pub long_break_duration: Option<i64>,
    #[serde(default)]
    pub daily_goal: Option<i64>,
    #[serde(default)]
    pub sound_notifications: Option<bool>,
    #[serde(default)]
    pub browser_notifications: Option<bool>,
    #[serde(default)]
    pub theme: Option<Theme>,
}

impl SettingsUpdate {
    pub fn validate(&self) -> Result<(), &'static str> {
        let positive = [
            (self.focus_duration, "focusDuration must be > 0"),
            (self.short_break_duration, "shortBreakDuration must be > 0"),
            (self.long_break_duration, "longBreakDuration must be > 0"),
            (self.daily_goal, "dailyGoal must be > 0"),
        ];
        for (value, msg) in positive {
            if matches!(value, Some(v) if v <= 0) {
                return Err(msg);
            }
        }
        Ok(())
    }

    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(v) = self.focus_duration {
            settings.focus_duration = v;
        }
        if let Some(v) = self.short_break_duration {
            settings.short_break_duration = v;
        }
        if let Some(v) = self.long_break_duration {
            settings.long_break_duration = v;
        }
        if let Some(v) = self.daily_goal {
            settings.daily_goal = v;
        }
        if let Some(v) = self.sound_notifications {
            settings.sound_notifications = v;
        }
        if let Some(v) = self.browser_notifications {
            settings.browser_notifications = v;
        }
        if let Some(v) = self.theme {
            settings.theme = v;
        }
    }
}

/// Parses a date-range bound: an RFC 3339 timestamp, or `YYYY-MM-DD` meaning midnight UTC.
pub fn parse_range_bound(input: &str) -> Option<OffsetDateTime> {
    let input = input.trim();
    if let Ok(ts) = OffsetDateTime::parse(input, &Rfc3339) {
        return Some(ts);
    }
    let day = Date::parse(input, format_description!("[year]-[month]-[day]")).ok()?;
    Some(day.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_defaults_note_and_completed() {
        let body = serde_json::json!({ "startTime": "2024-05-01T09:00:00Z", "duration": 1500 });
        let new: NewSession = serde_json::from_value(body).unwrap();
        let s = new.into_session(7);
        assert_eq!(s.id, 7);
        assert_eq!(s.note, None);
        assert!(!s.completed);
    }

    #[test]
    fn new_session_rejects_negative_duration() {
        let body = serde_json::json!({ "startTime": "2024-05-01T09:00:00Z", "duration": -1 });
        let new: NewSession = serde_json::from_value(body).unwrap();
        assert!(new.validate().is_err());
    }

    #[test]
    fn new_session_requires_start_time() {
        let body = serde_json::json!({ "duration": 60 });
        assert!(serde_json::from_value::<NewSession>(body).is_err());
    }

    #[test]
    fn settings_serialize_camel_case() {
        let v = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(v["focusDuration"], 1500);
        assert_eq!(v["shortBreakDuration"], 300);
        assert_eq!(v["longBreakDuration"], 1800);
        assert_eq!(v["dailyGoal"], 4);
        assert_eq!(v["soundNotifications"], true);
        assert_eq!(v["browserNotifications"], false);
        assert_eq!(v["theme"], "light");
    }

    #[test]
    fn settings_update_merges_only_present_fields() {
        let update: SettingsUpdate =
            serde_json::from_value(serde_json::json!({ "focusDuration": 3000, "theme": "dark" }))
                .unwrap();
        update.validate().unwrap();
        let mut s = Settings::default();
        update.apply_to(&mut s);
        assert_eq!(s.focus_duration, 3000);
        assert_eq!(s.theme, Theme::Dark);
        assert_eq!(s.short_break_duration, DEFAULT_SHORT_BREAK_SECONDS);
    }

    #[test]
    fn settings_update_rejects_zero_goal_and_unknown_theme() {
        let update: SettingsUpdate =
            serde_json::from_value(serde_json::json!({ "dailyGoal": 0 })).unwrap();
        assert!(update.validate().is_err());
        assert!(
            serde_json::from_value::<SettingsUpdate>(serde_json::json!({ "theme": "sepia" }))
                .is_err()
        );
    }

    #[test]
    fn range_bound_accepts_plain_dates() {
        let ts = parse_range_bound("2024-05-01").unwrap();
        assert_eq!(ts, OffsetDateTime::parse("2024-05-01T00:00:00Z", &Rfc3339).unwrap());
        let ts = parse_range_bound("2024-05-01T10:30:00+02:00").unwrap();
        assert_eq!(ts.hour(), 10);
        assert!(parse_range_bound("yesterday").is_none());
    }
}
