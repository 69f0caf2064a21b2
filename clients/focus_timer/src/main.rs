use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

mod alerts;
mod api;
mod local;
mod model;
mod report;
mod shell;
mod ticker;
mod timer;

use api::CoreClient;
use local::LocalStore;
use model::{SettingsUpdate, Theme};

#[derive(Parser, Debug)]
#[command(name = "focus_timer", version, about = "FocusHero pomodoro timer")]
struct Args {
    /// Base URL of focus_core.
    #[arg(
        long,
        global = true,
        env = "FOCUS_CORE_URL",
        default_value = "http://127.0.0.1:17700"
    )]
    core_url: String,

    /// Directory for local timer state and preferences.
    #[arg(long, global = true, env = "FOCUS_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the timer interactively (default).
    Run,
    /// List past sessions, newest first.
    History {
        #[command(flatten)]
        period: Period,
        /// Only sessions within a minute of this length (seconds).
        #[arg(long)]
        duration: Option<i64>,
    },
    /// Today's progress, totals and streak.
    Stats,
    /// Write sessions (or settings) to a file or stdout.
    Export {
        #[command(flatten)]
        period: Period,
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Export settings instead of sessions.
        #[arg(long)]
        settings: bool,
        /// Output path. `-` for stdout; defaults to a dated file name.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show or change the timer settings stored by the core.
    Settings {
        #[command(subcommand)]
        action: SettingsCmd,
    },
    /// Show or set the local theme preference.
    Theme { theme: Option<Theme> },
    /// Print one motivational quote.
    Quote,
    /// Delete all local state.
    Clear,
}

#[derive(ClapArgs, Debug)]
struct Period {
    /// Only sessions from the last N days.
    #[arg(long, default_value_t = 7, conflicts_with = "all")]
    days: u32,
    /// Every session regardless of age.
    #[arg(long)]
    all: bool,
}

impl Period {
    fn days(&self) -> Option<u32> {
        (!self.all).then_some(self.days)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

#[derive(Subcommand, Debug)]
enum SettingsCmd {
    Show,
    Set {
        #[arg(long)]
        focus_minutes: Option<i64>,
        #[arg(long)]
        short_break_minutes: Option<i64>,
        #[arg(long)]
        long_break_minutes: Option<i64>,
        #[arg(long)]
        daily_goal: Option<i64>,
        #[arg(long, action = clap::ArgAction::Set)]
        sound: Option<bool>,
        #[arg(long, action = clap::ArgAction::Set)]
        notifications: Option<bool>,
        #[arg(long)]
        theme: Option<Theme>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "focus_timer=info".into()),
        )
        .init();

    let args = Args::parse();
    let client = CoreClient::new(&args.core_url).context("build http client")?;
    let local = LocalStore::open(args.state_dir.clone())?;

    match args.command.unwrap_or(Cmd::Run) {
        Cmd::Run => shell::run(client, local, Arc::new(alerts::DesktopAlerts)).await,
        Cmd::History { period, duration } => history(&client, &period, duration).await,
        Cmd::Stats => stats(&client).await,
        Cmd::Export {
            period,
            format,
            settings,
            out,
        } => export(&client, &period, format, settings, out).await,
        Cmd::Settings { action } => settings(&client, action).await,
        Cmd::Theme { theme } => {
            match theme {
                Some(t) => {
                    local.save_theme(t)?;
                    println!("theme set to {t}");
                }
                None => println!("{}", local.load_theme()),
            }
            Ok(())
        }
        Cmd::Quote => {
            let q = client.motivation().await.context("fetch quote")?;
            println!("\"{q}\"");
            Ok(())
        }
        Cmd::Clear => {
            let n = local.clear()?;
            println!("removed {n} file(s) from {}", local.dir().display());
            Ok(())
        }
    }
}

async fn history(client: &CoreClient, period: &Period, duration: Option<i64>) -> anyhow::Result<()> {
    let now = Utc::now();
    let loaded = load_sessions(client, period).await?;
    let sessions = report::filter_sessions(&loaded, period.days(), duration, now);
    if sessions.is_empty() {
        if loaded.is_empty() && period.all {
            println!("No sessions yet. Complete a focus session to see it here.");
        } else {
            println!("No sessions match the current filters.");
        }
        return Ok(());
    }
    let local_now = Local::now();
    for s in &sessions {
        let note = s.note.as_deref().map(|n| format!("  {n}")).unwrap_or_default();
        println!(
            "{:<22} {:>8}  {}{note}",
            report::format_when(s.start_time, &local_now),
            report::fmt_duration(s.duration),
            if s.completed { "completed" } else { "incomplete" },
        );
    }
    if let Some((count, total, avg)) = report::summary(&sessions) {
        println!(
            "\n{count} sessions, {}m total focus, {}m average",
            total / 60,
            avg / 60
        );
    }
    Ok(())
}

/// Bounded periods go through the core's date-range query.
async fn load_sessions(client: &CoreClient, period: &Period) -> anyhow::Result<Vec<model::Session>> {
    let sessions = match period.days() {
        Some(days) => {
            let end = Utc::now();
            let start = end - chrono::Duration::days(i64::from(days));
            client.sessions_between(start, end).await
        }
        None => client.sessions().await,
    };
    sessions.context("load sessions")
}

async fn stats(client: &CoreClient) -> anyhow::Result<()> {
    let settings = client.settings().await.context("load settings")?;
    let sessions = client.sessions().await.context("load sessions")?;
    let s = report::compute_stats(&sessions, &settings, &Local::now());
    println!("Today's sessions:  {} / {}", s.today_sessions, s.daily_goal);
    println!("Today's focus:     {}m", s.today_minutes);
    println!("Total focus time:  {}m", s.total_minutes);
    println!("Current streak:    {} days", s.streak_days);
    Ok(())
}

async fn export(
    client: &CoreClient,
    period: &Period,
    format: ExportFormat,
    settings: bool,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let (body, default_name) = if settings {
        let s = client.settings().await.context("load settings")?;
        (
            report::settings_export_json(&s, now)?,
            report::export_file_name("settings", "json", now),
        )
    } else {
        let loaded = load_sessions(client, period).await?;
        let sessions = report::filter_sessions(&loaded, period.days(), None, now);
        if sessions.is_empty() {
            anyhow::bail!("nothing to export");
        }
        match format {
            ExportFormat::Json => (
                report::export_json(&sessions)?,
                report::export_file_name("sessions", "json", now),
            ),
            ExportFormat::Csv => (
                report::export_csv(&sessions),
                report::export_file_name("sessions", "csv", now),
            ),
        }
    };

    let path = out.unwrap_or_else(|| PathBuf::from(default_name));
    if path.as_os_str() == "-" {
        println!("{body}");
        return Ok(());
    }
    std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    println!("exported to {}", path.display());
    Ok(())
}

async fn settings(client: &CoreClient, action: SettingsCmd) -> anyhow::Result<()> {
    let current = match action {
        SettingsCmd::Show => client.settings().await.context("load settings")?,
        SettingsCmd::Set {
            focus_minutes,
            short_break_minutes,
            long_break_minutes,
            daily_goal,
            sound,
            notifications,
            theme,
        } => {
            let update = SettingsUpdate {
                focus_duration: minutes_to_seconds(focus_minutes, "--focus-minutes")?,
                short_break_duration: minutes_to_seconds(
                    short_break_minutes,
                    "--short-break-minutes",
                )?,
                long_break_duration: minutes_to_seconds(long_break_minutes, "--long-break-minutes")?,
                daily_goal,
                sound_notifications: sound,
                browser_notifications: notifications,
                theme,
            };
            if update.is_empty() {
                anyhow::bail!("nothing to change; see `focus_timer settings set --help`");
            }
            let saved = client
                .update_settings(&update)
                .await
                .context("Failed to save settings")?;
            println!("Settings saved.");
            saved
        }
    };
    println!("Focus:          {}", report::fmt_duration(current.focus_duration));
    println!("Short break:    {}", report::fmt_duration(current.short_break_duration));
    println!("Long break:     {}", report::fmt_duration(current.long_break_duration));
    println!("Daily goal:     {} sessions", current.daily_goal);
    println!("Sound:          {}", on_off(current.sound_notifications));
    println!("Notifications:  {}", on_off(current.browser_notifications));
    println!("Theme:          {}", current.theme);
    Ok(())
}

fn minutes_to_seconds(minutes: Option<i64>, flag: &str) -> anyhow::Result<Option<i64>> {
    minutes
        .map(|m| {
            m.checked_mul(60)
                .with_context(|| format!("{flag} {m} is too large"))
        })
        .transpose()
}

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_run() {
        let args = Args::try_parse_from(["focus_timer"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.core_url, "http://127.0.0.1:17700");
    }

    #[test]
    fn period_flags() {
        let args = Args::try_parse_from(["focus_timer", "history", "--all"]).unwrap();
        match args.command {
            Some(Cmd::History { period, .. }) => assert_eq!(period.days(), None),
            other => panic!("unexpected: {other:?}"),
        }
        let args = Args::try_parse_from(["focus_timer", "export", "--days", "30", "--format", "csv"])
            .unwrap();
        match args.command {
            Some(Cmd::Export { period, format, .. }) => {
                assert_eq!(period.days(), Some(30));
                assert_eq!(format, ExportFormat::Csv);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(Args::try_parse_from(["focus_timer", "history", "--all", "--days", "3"]).is_err());
    }

    #[test]
    fn minutes_convert_without_overflow() {
        assert_eq!(minutes_to_seconds(Some(25), "--focus-minutes").unwrap(), Some(1500));
        assert_eq!(minutes_to_seconds(None, "--focus-minutes").unwrap(), None);
        let err = minutes_to_seconds(Some(i64::MAX), "--focus-minutes").unwrap_err();
        assert!(err.to_string().contains("--focus-minutes"));
    }

    #[test]
    fn settings_set_parses_bools_and_theme() {
        let args = Args::try_parse_from([
            "focus_timer",
            "settings",
            "set",
            "--focus-minutes",
            "50",
            "--sound",
            "false",
            "--theme",
            "dark",
        ])
        .unwrap();
        match args.command {
            Some(Cmd::Settings {
                action:
                    SettingsCmd::Set {
                        focus_minutes,
                        sound,
                        theme,
                        ..
                    },
            }) => {
                assert_eq!(focus_minutes, Some(50));
                assert_eq!(sound, Some(false));
                assert_eq!(theme, Some(Theme::Dark));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
