use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::alerts::{announce, Alerts};
use crate::api::{ApiError, CoreClient, SessionSink};
use crate::local::LocalStore;
use crate::model::{Session, Settings};
use crate::ticker::{Tick, Ticker};
use crate::timer::{format_clock, Timer};

const TICK_PERIOD: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const HELP: &str = "commands: start | pause | toggle | reset | note <text> | status | quote | refresh | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Toggle,
    Reset,
    Note(String),
    Status,
    Quote,
    Refresh,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        Some(match word.to_ascii_lowercase().as_str() {
            "start" | "s" => Command::Start,
            "pause" | "p" => Command::Pause,
            "toggle" | "t" => Command::Toggle,
            "reset" | "r" => Command::Reset,
            "note" | "n" => Command::Note(rest.to_string()),
            "status" | "st" => Command::Status,
            "quote" | "q" => Command::Quote,
            "refresh" => Command::Refresh,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        })
    }
}

type SaveResult = Result<Session, ApiError>;

/// Receiving ends of the controller's message sources.
pub struct Inbox {
    pub ticks: mpsc::Receiver<Tick>,
    pub saved: mpsc::UnboundedReceiver<SaveResult>,
}

pub struct Controller {
    timer: Timer,
    sink: Arc<dyn SessionSink>,
    alerts: Arc<dyn Alerts>,
    local: LocalStore,
    ticker: Option<Ticker>,
    next_ticker: u64,
    period: Duration,
    tick_tx: mpsc::Sender<Tick>,
    saved_tx: mpsc::UnboundedSender<SaveResult>,
    pending: usize,
}

impl Controller {
    pub fn new(
        timer: Timer,
        sink: Arc<dyn SessionSink>,
        alerts: Arc<dyn Alerts>,
        local: LocalStore,
        period: Duration,
    ) -> (Self, Inbox) {
        let (tick_tx, ticks) = mpsc::channel(16);
        let (saved_tx, saved) = mpsc::unbounded_channel();
        let ctl = Self {
            timer,
            sink,
            alerts,
            local,
            ticker: None,
            next_ticker: 0,
            period,
            tick_tx,
            saved_tx,
            pending: 0,
        };
        (ctl, Inbox { ticks, saved })
    }

    #[cfg(test)]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn is_running(&self) -> bool {
        self.timer.state().is_running
    }

    pub fn pending_saves(&self) -> usize {
        self.pending
    }

    pub fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start => self.start(),
            Command::Pause => self.pause(),
            Command::Toggle => {
                if self.is_running() {
                    self.pause()
                } else {
                    self.start()
                }
            }
            Command::Reset => {
                self.stop_ticker();
                self.timer.reset();
                self.save();
                self.print_status();
            }
            Command::Note(text) => {
                self.timer.set_session_note(&text);
                if text.trim().is_empty() {
                    println!("note cleared");
                } else {
                    println!("note: {}", text.trim());
                }
            }
            Command::Status => self.print_status(),
            Command::Help => println!("{HELP}"),
            Command::Unknown(line) => println!("unknown command: {line} (try `help`)"),
            // Handled by the run loop, which owns the core client.
            Command::Quote | Command::Refresh | Command::Quit => {}
        }
    }

    fn start(&mut self) {
        if !self.timer.start(Utc::now()) {
            return;
        }
        self.next_ticker += 1;
        self.ticker = Some(Ticker::start(
            self.next_ticker,
            self.period,
            self.tick_tx.clone(),
        ));
        self.save();
        self.print_status();
    }

    fn pause(&mut self) {
        if !self.timer.pause() {
            return;
        }
        self.stop_ticker();
        self.save();
        self.print_status();
    }

    fn stop_ticker(&mut self) {
        if let Some(t) = self.ticker.take() {
            t.stop();
        }
    }

    pub fn on_tick(&mut self, tick: Tick) {
        // Ticks already queued by a cancelled ticker.
        if self.ticker.as_ref().map(Ticker::id) != Some(tick.ticker) {
            return;
        }
        if self.timer.tick() {
            self.stop_ticker();
            self.finish_phase();
        } else if self.timer.state().current_time % 60 == 0 {
            self.print_status();
        }
    }

    /// Runs the expiry transition if the countdown is out. Safe to call any time.
    pub fn finish_phase(&mut self) {
        let Some(expiry) = self.timer.complete_phase() else {
            return;
        };
        if let Some(session) = expiry.session.clone() {
            self.pending += 1;
            let sink = Arc::clone(&self.sink);
            let tx = self.saved_tx.clone();
            tokio::spawn(async move {
                let _ = tx.send(sink.record(session).await);
            });
        }
        announce(self.alerts.as_ref(), self.timer.settings(), &expiry);
        println!("{}", expiry.message());
        println!(
            "Next: {} ({})",
            expiry.next.label(),
            format_clock(expiry.next_duration)
        );
        self.save();
        self.print_status();
    }

    pub fn on_saved(&mut self, res: SaveResult) {
        self.pending = self.pending.saturating_sub(1);
        match res {
            Ok(session) => {
                self.timer.record_completed();
                info!(id = session.id, "focus session saved");
                self.save();
            }
            Err(e) => error!("failed to save focus session: {e}"),
        }
    }

    pub fn apply_settings(&mut self, settings: Settings) {
        self.timer.apply_settings(settings);
        self.save();
    }

    /// Startup reconciliation: finish a phase that ran out while we were away,
    /// then adopt the settings fetched from the core.
    pub fn resume(&mut self, settings: Option<Settings>) {
        self.finish_phase();
        if let Some(s) = settings {
            self.apply_settings(s);
        }
    }

    pub fn print_status(&self) {
        let s = self.timer.state();
        let note = self.timer.session_note().trim();
        println!(
            "{} {} ({:.0}%) {} | sessions: {}{}",
            s.phase.label(),
            format_clock(s.current_time),
            self.timer.progress(),
            if s.is_running { "running" } else { "paused" },
            s.completed_sessions,
            if note.is_empty() {
                String::new()
            } else {
                format!(" | note: {note}")
            }
        );
    }

    fn save(&self) {
        if let Err(e) = self.local.save_timer_state(self.timer.state()) {
            warn!("saving timer state failed: {e:#}");
        }
    }

    /// Stops ticking, saves, then waits up to `grace` for in-flight session saves.
    pub async fn shutdown(&mut self, inbox: &mut Inbox, grace: Duration) {
        self.stop_ticker();
        if self.timer.pause() {
            self.save();
        }
        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);
        while self.pending > 0 {
            tokio::select! {
                res = inbox.saved.recv() => match res {
                    Some(res) => self.on_saved(res),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(pending = self.pending, "gave up waiting for session saves");
                    break;
                }
            }
        }
        self.save();
    }
}

async fn print_quote(client: &CoreClient) {
    match client.motivation().await {
        Ok(q) => println!("\"{q}\""),
        Err(e) => {
            warn!("quote unavailable: {e}");
            println!("Unable to load quote. Type `quote` to try again.");
        }
    }
}

pub async fn run(client: CoreClient, local: LocalStore, alerts: Arc<dyn Alerts>) -> anyhow::Result<()> {
    let settings = match client.settings().await {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("core unavailable at {}, using default durations: {e}", client.base_url());
            None
        }
    };
    let timer = match local.load_timer_state() {
        Some(state) => Timer::restore(state, settings),
        None => Timer::new(settings),
    };
    let sink: Arc<dyn SessionSink> = Arc::new(client.clone());
    let (mut ctl, mut inbox) = Controller::new(timer, sink, alerts, local, TICK_PERIOD);

    ctl.resume(settings);
    print_quote(&client).await;
    ctl.print_status();
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(tick) = inbox.ticks.recv() => ctl.on_tick(tick),
            Some(res) = inbox.saved.recv() => ctl.on_saved(res),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match Command::parse(&line) {
                    None => {}
                    Some(Command::Quit) => break,
                    Some(Command::Quote) => print_quote(&client).await,
                    Some(Command::Refresh) => match client.settings().await {
                        Ok(s) => {
                            ctl.apply_settings(s);
                            ctl.print_status();
                        }
                        Err(e) => println!("Failed to refresh settings: {e}"),
                    },
                    Some(cmd) => ctl.handle(cmd),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin: {e}");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }
        if !stdin_open && !ctl.is_running() && ctl.pending_saves() == 0 {
            break;
        }
    }

    ctl.shutdown(&mut inbox, SHUTDOWN_GRACE).await;
    Ok(())
}
