use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub duration: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub start_time: DateTime<Utc>,
    pub duration: i64,
    pub note: Option<String>,
    pub completed: bool,
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Auto => "auto",
        })
    }
}

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
            focus_duration: 1500,
            short_break_duration: 300,
            long_break_duration: 1800,
            daily_goal: 4,
            sound_notifications: true,
            browser_notifications: false,
            theme: Theme::Light,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_break_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_break_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_goal: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == SettingsUpdate::default()
    }
}
