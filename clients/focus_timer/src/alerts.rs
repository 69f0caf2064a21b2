use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::model::Settings;
use crate::timer::Expiry;

const APP_NAME: &str = "FocusHero";

/// Best-effort attention grabbers. Implementations must never panic or block for long.
pub trait Alerts: Send + Sync {
    fn play_sound(&self);
    fn notify(&self, title: &str, body: &str);
}

/// Fires the side effects enabled in `settings` for a finished phase.
pub fn announce(alerts: &dyn Alerts, settings: Option<&Settings>, expiry: &Expiry) {
    let Some(settings) = settings else {
        return;
    };
    if settings.sound_notifications {
        alerts.play_sound();
    }
    if settings.browser_notifications {
        alerts.notify(APP_NAME, expiry.message());
    }
}

/// Desktop notifications plus a short system sound.
pub struct DesktopAlerts;

const SOUND_CANDIDATES: [(&str, &str); 3] = [
    ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga"),
    ("aplay", "/usr/share/sounds/sound-icons/guitar-11.wav"),
    ("aplay", "/usr/share/sounds/generic.wav"),
];

/// Starts `program` detached; a helper thread waits on it so it never lingers as a zombie.
fn spawn_reaped(program: &str, arg: &str) -> std::io::Result<()> {
    let mut child = Command::new(program)
        .arg(arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

impl Alerts for DesktopAlerts {
    fn play_sound(&self) {
        for (player, file) in SOUND_CANDIDATES {
            if !Path::new(file).exists() {
                continue;
            }
            match spawn_reaped(player, file) {
                Ok(()) => return,
                Err(e) => debug!("sound player {player} unavailable: {e}"),
            }
        }
        // Terminal bell.
        let mut out = std::io::stdout();
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }

    #[cfg(not(windows))]
    fn notify(&self, title: &str, body: &str) {
        if let Err(e) = notify_rust::Notification::new()
            .summary(title)
            .body(body)
            .appname(APP_NAME)
            .icon("alarm-clock")
            .show()
        {
            debug!("desktop notification failed: {e}");
        }
    }

    #[cfg(windows)]
    fn notify(&self, title: &str, body: &str) {
        use win_toast_notify::WinToastNotify;

        debug!("showing toast: {title}");
        let _ = WinToastNotify::new()
            .set_title(title)
            .set_messages(vec![body])
            .show();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Alerts;
    use std::sync::Mutex;

    /// Records every alert instead of making noise.
    #[derive(Default)]
    pub struct RecordingAlerts {
        pub sounds: Mutex<usize>,
        pub notes: Mutex<Vec<(String, String)>>,
    }

    impl Alerts for RecordingAlerts {
        fn play_sound(&self) {
            *self.sounds.lock().unwrap() += 1;
        }

        fn notify(&self, title: &str, body: &str) {
            self.notes
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }
}
