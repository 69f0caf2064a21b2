use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::Serialize;

use crate::model::{Session, Settings};

/// Duration filter tolerance, in seconds.
const DURATION_SLACK: i64 = 60;

pub const EXPORT_VERSION: &str = "1.0";

/// Sessions started within the last `days` days (all when `None`) whose
/// length is within a minute of `duration` (any when `None`).
pub fn filter_sessions(
    sessions: &[Session],
    days: Option<u32>,
    duration: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<Session> {
    let cutoff = days.map(|d| now - Duration::days(i64::from(d)));
    sessions
        .iter()
        .filter(|s| cutoff.map_or(true, |c| s.start_time >= c))
        .filter(|s| duration.map_or(true, |d| (s.duration - d).abs() < DURATION_SLACK))
        .cloned()
        .collect()
}

/// "Today, 9:05 AM", "Yesterday, 4:10 PM" or "May 3, 8:00 AM", in `now`'s zone.
pub fn format_when<Tz: TimeZone>(start: DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let local = start.with_timezone(&now.timezone());
    let clock = local.format("%-I:%M %p");
    let today = now.date_naive();
    let day = local.date_naive();
    if day == today {
        format!("Today, {clock}")
    } else if today.pred_opt() == Some(day) {
        format!("Yesterday, {clock}")
    } else {
        format!("{}, {clock}", local.format("%b %-d"))
    }
}

pub fn fmt_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0s".to_string();
    }
    let m = seconds / 60;
    let s = seconds % 60;
    match (m, s) {
        (0, s) => format!("{s}s"),
        (m, 0) => format!("{m}m"),
        (m, s) => format!("{m}m {s}s"),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub today_sessions: usize,
    pub daily_goal: i64,
    pub today_minutes: i64,
    pub total_minutes: i64,
    pub streak_days: u32,
}

/// Dashboard numbers. Only completed sessions count; days are local to `now`.
pub fn compute_stats<Tz: TimeZone>(
    sessions: &[Session],
    settings: &Settings,
    now: &DateTime<Tz>,
) -> Stats {
    let tz = now.timezone();
    let today = now.date_naive();
    let mut days = BTreeSet::new();
    let mut stats = Stats {
        daily_goal: settings.daily_goal,
        ..Stats::default()
    };
    let mut today_seconds = 0;
    let mut total_seconds = 0;

    for s in sessions.iter().filter(|s| s.completed) {
        let day = s.start_time.with_timezone(&tz).date_naive();
        days.insert(day);
        total_seconds += s.duration;
        if day == today {
            stats.today_sessions += 1;
            today_seconds += s.duration;
        }
    }
    stats.today_minutes = today_seconds / 60;
    stats.total_minutes = total_seconds / 60;
    stats.streak_days = streak(&days, today);
    stats
}

/// Consecutive days with activity, ending today or (if today is still empty) yesterday.
fn streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(y) if days.contains(&y) => y,
            _ => return 0,
        }
    };
    let mut n = 0;
    loop {
        n += 1;
        match cursor.pred_opt() {
            Some(prev) if days.contains(&prev) => cursor = prev,
            _ => return n,
        }
    }
}

/// Count, total and average over a filtered history.
pub fn summary(sessions: &[Session]) -> Option<(usize, i64, i64)> {
    if sessions.is_empty() {
        return None;
    }
    let total: i64 = sessions.iter().map(|s| s.duration).sum();
    let avg = total / sessions.len() as i64;
    Some((sessions.len(), total, avg))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRow<'a> {
    start_time: String,
    duration: i64,
    note: Option<&'a str>,
    completed: bool,
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn export_json(sessions: &[Session]) -> anyhow::Result<String> {
    let rows: Vec<ExportRow<'_>> = sessions
        .iter()
        .map(|s| ExportRow {
            start_time: rfc3339(s.start_time),
            duration: s.duration,
            note: s.note.as_deref(),
            completed: s.completed,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

pub fn export_csv(sessions: &[Session]) -> String {
    let mut out = String::from("startTime,duration,note,completed\n");
    for s in sessions {
        out.push_str(&format!(
            "{},{},{},{}\n",
            rfc3339(s.start_time),
            s.duration,
            csv_escape(s.note.as_deref().unwrap_or("")),
            s.completed
        ));
    }
    out
}

fn csv_escape(s: &str) -> String {
    let needs_quote = s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r');
    if !needs_quote {
        return s.to_string();
    }
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsExport<'a> {
    settings: &'a Settings,
    export_date: String,
    version: &'static str,
}

pub fn settings_export_json(settings: &Settings, now: DateTime<Utc>) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&SettingsExport {
        settings,
        export_date: rfc3339(now),
        version: EXPORT_VERSION,
    })?)
}

/// `focushero-sessions-YYYY-MM-DD.<ext>`
pub fn export_file_name(kind: &str, ext: &str, now: DateTime<Utc>) -> String {
    format!("focushero-{kind}-{}.{ext}", now.format("%Y-%m-%d"))
}
