use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{NewSession, Settings};

pub const DEFAULT_FOCUS_SECONDS: u32 = 25 * 60;
pub const DEFAULT_SHORT_BREAK_SECONDS: u32 = 5 * 60;
pub const DEFAULT_LONG_BREAK_SECONDS: u32 = 30 * 60;

/// Every fourth completed focus session earns a long break.
const SESSIONS_PER_LONG_BREAK: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Focus => "Focus",
            Phase::ShortBreak => "Short break",
            Phase::LongBreak => "Long break",
        }
    }
}

/// Authoritative length of `phase` in seconds.
pub fn resolve_duration(settings: Option<&Settings>, phase: Phase) -> u32 {
    let (configured, fallback) = match phase {
        Phase::Focus => (
            settings.map(|s| s.focus_duration),
            DEFAULT_FOCUS_SECONDS,
        ),
        Phase::ShortBreak => (
            settings.map(|s| s.short_break_duration),
            DEFAULT_SHORT_BREAK_SECONDS,
        ),
        Phase::LongBreak => (
            settings.map(|s| s.long_break_duration),
            DEFAULT_LONG_BREAK_SECONDS,
        ),
    };
    configured
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .unwrap_or(fallback)
}

/// Persistable snapshot of the timer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub phase: Phase,
    pub current_time: u32,
    pub duration: u32,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_sessions: u32,
}

impl TimerState {
    fn fresh(settings: Option<&Settings>) -> Self {
        let duration = resolve_duration(settings, Phase::Focus);
        Self {
            phase: Phase::Focus,
            current_time: duration,
            duration,
            is_running: false,
            start_time: None,
            completed_sessions: 0,
        }
    }
}

/// Result of a phase running out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expiry {
    pub finished: Phase,
    pub next: Phase,
    pub next_duration: u32,
    /// Present only when a focus phase finished.
    pub session: Option<NewSession>,
}

impl Expiry {
    pub fn message(&self) -> &'static str {
        match self.finished {
            Phase::Focus => "Focus session completed! Time for a break.",
            Phase::ShortBreak | Phase::LongBreak => {
                "Break time is over! Ready for another focus session?"
            }
        }
    }
}

#[derive(Debug)]
pub struct Timer {
    state: TimerState,
    settings: Option<Settings>,
    note: String,
}

impl Timer {
    pub fn new(settings: Option<Settings>) -> Self {
        Self {
            state: TimerState::fresh(settings.as_ref()),
            settings,
            note: String::new(),
        }
    }

    /// Rebuilds a timer from a persisted snapshot. Never resumes running.
    pub fn restore(mut state: TimerState, settings: Option<Settings>) -> Self {
        state.is_running = false;
        if state.duration == 0 {
            state.duration = resolve_duration(settings.as_ref(), state.phase);
        }
        state.current_time = state.current_time.min(state.duration);
        Self {
            state,
            settings,
            note: String::new(),
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn session_note(&self) -> &str {
        &self.note
    }

    pub fn set_session_note(&mut self, text: &str) {
        self.note = text.to_string();
    }

    /// Returns false when the timer was already running.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.is_running {
            return false;
        }
        self.state.is_running = true;
        if self.state.start_time.is_none() {
            self.state.start_time = Some(now);
        }
        true
    }

    /// Returns false when the timer was not running.
    pub fn pause(&mut self) -> bool {
        let was_running = self.state.is_running;
        self.state.is_running = false;
        was_running
    }

    /// Advances one second. Returns true on the tick that runs the countdown out.
    pub fn tick(&mut self) -> bool {
        if !self.state.is_running {
            return false;
        }
        if self.state.current_time <= 1 {
            self.state.current_time = 0;
            self.state.is_running = false;
            return true;
        }
        self.state.current_time -= 1;
        false
    }

    pub fn reset(&mut self) {
        let duration = resolve_duration(self.settings.as_ref(), Phase::Focus);
        self.state.phase = Phase::Focus;
        self.state.current_time = duration;
        self.state.duration = duration;
        self.state.is_running = false;
        self.state.start_time = None;
        self.note.clear();
    }

    /// Moves to the next phase once the countdown is out.
    ///
    /// Fires at most once per phase: the start time is cleared by the transition,
    /// so repeated calls return `None`.
    pub fn complete_phase(&mut self) -> Option<Expiry> {
        if self.state.current_time != 0 {
            return None;
        }
        let start_time = self.state.start_time?;
        let finished = self.state.phase;

        let session = (finished == Phase::Focus).then(|| {
            let note = self.note.trim();
            NewSession {
                start_time,
                duration: i64::from(resolve_duration(self.settings.as_ref(), Phase::Focus)),
                note: (!note.is_empty()).then(|| note.to_string()),
                completed: true,
            }
        });

        let next = match finished {
            Phase::Focus
                if (self.state.completed_sessions + 1) % SESSIONS_PER_LONG_BREAK == 0 =>
            {
                Phase::LongBreak
            }
            Phase::Focus => Phase::ShortBreak,
            Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
        };
        let next_duration = resolve_duration(self.settings.as_ref(), next);

        self.state.phase = next;
        self.state.current_time = next_duration;
        self.state.duration = next_duration;
        self.state.is_running = false;
        self.state.start_time = None;
        self.note.clear();

        Some(Expiry {
            finished,
            next,
            next_duration,
            session,
        })
    }

    /// Counts a focus session whose record was stored.
    pub fn record_completed(&mut self) {
        self.state.completed_sessions = self.state.completed_sessions.saturating_add(1);
    }

    /// Adopts new settings. An idle timer restarts its current phase at the
    /// configured length; a running countdown is left alone.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.settings = Some(settings);
        if self.state.is_running {
            return;
        }
        let duration = resolve_duration(self.settings.as_ref(), self.state.phase);
        self.state.duration = duration;
        self.state.current_time = duration;
    }

    /// Percentage of the current phase already elapsed.
    pub fn progress(&self) -> f64 {
        if self.state.duration == 0 {
            return 0.0;
        }
        let elapsed = self.state.duration - self.state.current_time;
        f64::from(elapsed) / f64::from(self.state.duration) * 100.0
    }
}

pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn settings() -> Settings {
        Settings {
            focus_duration: 3,
            short_break_duration: 2,
            long_break_duration: 5,
            ..Settings::default()
        }
    }

    fn run_out(timer: &mut Timer) -> Expiry {
        timer.start(now());
        while !timer.tick() {}
        timer.complete_phase().expect("phase should complete")
    }

    #[test]
    fn fresh_timer_uses_focus_length() {
        let t = Timer::new(Some(settings()));
        assert_eq!(t.state().phase, Phase::Focus);
        assert_eq!(t.state().current_time, 3);
        assert_eq!(t.state().duration, 3);
        assert!(!t.state().is_running);

        let t = Timer::new(None);
        assert_eq!(t.state().duration, DEFAULT_FOCUS_SECONDS);
    }

    #[test]
    fn resolve_duration_falls_back_per_phase() {
        assert_eq!(resolve_duration(None, Phase::Focus), 1500);
        assert_eq!(resolve_duration(None, Phase::ShortBreak), 300);
        assert_eq!(resolve_duration(None, Phase::LongBreak), 1800);
        let s = settings();
        assert_eq!(resolve_duration(Some(&s), Phase::LongBreak), 5);
        let broken = Settings {
            short_break_duration: -4,
            ..settings()
        };
        assert_eq!(resolve_duration(Some(&broken), Phase::ShortBreak), 300);
    }

    #[test]
    fn start_is_idempotent_and_keeps_first_start_time() {
        let mut t = Timer::new(Some(settings()));
        assert!(t.start(now()));
        assert!(!t.start(now() + chrono::Duration::seconds(30)));
        assert_eq!(t.state().start_time, Some(now()));

        t.pause();
        t.start(now() + chrono::Duration::minutes(5));
        assert_eq!(t.state().start_time, Some(now()));
    }

    #[test]
    fn pause_keeps_remaining_time() {
        let mut t = Timer::new(Some(settings()));
        t.start(now());
        t.tick();
        assert!(t.pause());
        assert_eq!(t.state().current_time, 2);
        assert!(!t.tick());
        assert_eq!(t.state().current_time, 2);
    }

    #[test]
    fn ticks_never_increase_or_go_negative() {
        let mut t = Timer::new(Some(settings()));
        t.start(now());
        let mut last = t.state().current_time;
        for _ in 0..10 {
            t.tick();
            let cur = t.state().current_time;
            assert!(cur <= last);
            last = cur;
        }
        assert_eq!(last, 0);
        assert!(!t.state().is_running);
    }

    #[test]
    fn expiry_fires_once() {
        let mut t = Timer::new(Some(settings()));
        let expiry = run_out(&mut t);
        assert_eq!(expiry.finished, Phase::Focus);
        assert!(expiry.session.is_some());
        assert_eq!(t.complete_phase(), None);
        assert_eq!(t.complete_phase(), None);
    }

    #[test]
    fn expiry_without_start_does_nothing() {
        let state = TimerState {
            phase: Phase::Focus,
            current_time: 0,
            duration: 3,
            is_running: false,
            start_time: None,
            completed_sessions: 0,
        };
        let mut t = Timer::restore(state, Some(settings()));
        assert_eq!(t.complete_phase(), None);
    }

    #[test]
    fn focus_expiry_builds_session_with_trimmed_note() {
        let mut t = Timer::new(Some(settings()));
        t.set_session_note("  wrote the parser  ");
        let expiry = run_out(&mut t);
        let session = expiry.session.unwrap();
        assert_eq!(session.start_time, now());
        assert_eq!(session.duration, 3);
        assert_eq!(session.note.as_deref(), Some("wrote the parser"));
        assert!(session.completed);
        assert_eq!(t.session_note(), "");
    }

    #[test]
    fn blank_note_is_sent_as_absent() {
        let mut t = Timer::new(Some(settings()));
        t.set_session_note("   ");
        let expiry = run_out(&mut t);
        assert_eq!(expiry.session.unwrap().note, None);
    }

    #[test]
    fn long_break_after_every_fourth_focus() {
        for completed in 0..12u32 {
            let state = TimerState {
                completed_sessions: completed,
                ..TimerState::fresh(Some(&settings()))
            };
            let mut t = Timer::restore(state, Some(settings()));
            let expiry = run_out(&mut t);
            let expected = if completed % 4 == 3 {
                Phase::LongBreak
            } else {
                Phase::ShortBreak
            };
            assert_eq!(expiry.next, expected, "completed_sessions={completed}");
            assert_eq!(t.state().phase, expected);
        }
    }

    #[test]
    fn breaks_return_to_focus_without_a_session() {
        let mut t = Timer::new(Some(settings()));
        run_out(&mut t);
        assert_eq!(t.state().phase, Phase::ShortBreak);
        assert_eq!(t.state().duration, 2);
        let expiry = run_out(&mut t);
        assert_eq!(expiry.finished, Phase::ShortBreak);
        assert_eq!(expiry.next, Phase::Focus);
        assert!(expiry.session.is_none());
        assert_eq!(t.state().current_time, 3);
        assert_eq!(t.state().start_time, None);
    }

    #[test]
    fn counter_only_moves_on_record_completed() {
        let mut t = Timer::new(Some(settings()));
        run_out(&mut t);
        assert_eq!(t.state().completed_sessions, 0);
        t.record_completed();
        assert_eq!(t.state().completed_sessions, 1);
    }

    #[test]
    fn fourth_focus_with_default_settings_goes_to_long_break() {
        let state = TimerState {
            completed_sessions: 3,
            ..TimerState::fresh(Some(&Settings::default()))
        };
        let mut t = Timer::restore(state, Some(Settings::default()));
        t.start(now());
        for _ in 0..1500 {
            t.tick();
        }
        let expiry = t.complete_phase().unwrap();
        assert_eq!(expiry.session.unwrap().duration, 1500);
        assert_eq!(t.state().phase, Phase::LongBreak);
        assert_eq!(t.state().duration, 1800);
        assert_eq!(t.state().current_time, 1800);
    }

    #[test]
    fn reset_from_any_phase() {
        let mut t = Timer::new(Some(settings()));
        run_out(&mut t);
        t.start(now());
        t.tick();
        t.set_session_note("x");
        t.reset();
        let s = t.state();
        assert_eq!(s.phase, Phase::Focus);
        assert_eq!(s.current_time, 3);
        assert_eq!(s.duration, 3);
        assert!(!s.is_running);
        assert_eq!(s.start_time, None);
        assert_eq!(t.session_note(), "");
    }

    #[test]
    fn settings_change_while_idle_refreshes_current_phase() {
        let mut t = Timer::new(Some(settings()));
        run_out(&mut t);
        assert_eq!(t.state().phase, Phase::ShortBreak);
        t.apply_settings(Settings {
            short_break_duration: 7,
            ..settings()
        });
        assert_eq!(t.state().duration, 7);
        assert_eq!(t.state().current_time, 7);
    }

    #[test]
    fn any_settings_change_while_paused_restarts_the_phase() {
        let mut t = Timer::new(Some(settings()));
        t.start(now());
        t.tick();
        t.pause();
        assert_eq!(t.state().current_time, 2);
        t.apply_settings(Settings {
            daily_goal: 9,
            ..settings()
        });
        assert_eq!(t.state().duration, 3);
        assert_eq!(t.state().current_time, 3);
    }

    #[test]
    fn settings_change_while_running_leaves_countdown() {
        let mut t = Timer::new(Some(settings()));
        t.start(now());
        t.tick();
        t.apply_settings(Settings {
            focus_duration: 60,
            ..settings()
        });
        assert_eq!(t.state().duration, 3);
        assert_eq!(t.state().current_time, 2);

        // The new length applies from the next focus phase on.
        t.reset();
        assert_eq!(t.state().duration, 60);
    }

    #[test]
    fn restore_never_resumes_and_clamps() {
        let state = TimerState {
            phase: Phase::LongBreak,
            current_time: 99,
            duration: 5,
            is_running: true,
            start_time: Some(now()),
            completed_sessions: 4,
        };
        let t = Timer::restore(state, Some(settings()));
        assert!(!t.state().is_running);
        assert_eq!(t.state().current_time, 5);
        assert_eq!(t.state().completed_sessions, 4);
    }

    #[test]
    fn state_serializes_like_the_web_client() {
        let t = Timer::new(Some(settings()));
        let v = serde_json::to_value(t.state()).unwrap();
        assert_eq!(v["phase"], "focus");
        assert_eq!(v["currentTime"], 3);
        assert_eq!(v["isRunning"], false);
        assert_eq!(v["startTime"], serde_json::Value::Null);
        assert_eq!(v["completedSessions"], 0);

        let back: TimerState = serde_json::from_value(serde_json::json!({
            "phase": "long-break", "currentTime": 10, "duration": 1800
        }))
        .unwrap();
        assert_eq!(back.phase, Phase::LongBreak);
        assert_eq!(back.start_time, None);
    }

    #[test]
    fn clock_and_progress() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(61), "01:01");
        let mut t = Timer::new(Some(Settings {
            focus_duration: 4,
            ..settings()
        }));
        t.start(now());
        t.tick();
        assert!((t.progress() - 25.0).abs() < f64::EPSILON);
    }
}
