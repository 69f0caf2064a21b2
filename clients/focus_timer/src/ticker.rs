use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

/// One elapsed period from the ticker identified by `ticker`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub ticker: u64,
}

/// A running periodic trigger. Dropping the handle stops it.
pub struct Ticker {
    id: u64,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl Ticker {
    /// Sends a [`Tick`] tagged with `id` every `period`, starting one period from now.
    pub fn start(id: u64, period: Duration, tx: mpsc::Sender<Tick>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut every = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = every.tick() => {
                        if tx.send(Tick { ticker: id }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            id,
            cancel,
            _task: task,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn stop(self) {
        self.cancel.cancel();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let (tx, mut rx) = mpsc::channel(16);
        let ticker = Ticker::start(7, Duration::from_secs(1), tx);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let mut seen = Vec::new();
        while let Ok(t) = rx.try_recv() {
            seen.push(t);
        }
        assert_eq!(seen, vec![Tick { ticker: 7 }; 3]);
        assert_eq!(ticker.id(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(16);
        let ticker = Ticker::start(1, Duration::from_secs(1), tx);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(ticker);

        // The sender lives in the cancelled task, so the channel closes.
        let mut count = 0;
        while let Some(_tick) = rx.recv().await {
            count += 1;
        }
        assert_eq!(count, 1);
    }
}
