//! The driving loop around [`Bot::poll_once`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::bot::Bot;
use crate::config::PollConfig;
use crate::transport::Transport;

/// Cooperative stop flag shared by the loop, the Ctrl-C handler and handlers.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Requests shutdown on SIGINT/SIGTERM.
    pub fn install_ctrlc_handler(&self) -> anyhow::Result<()> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            eprintln!("Received interrupt signal, stopping after this pass...");
            signal.request();
        })
        .map_err(|e| anyhow::anyhow!("setting Ctrl-C handler: {e}"))
    }
}

/// Summary of a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub passes: u64,
    /// Passes that found nothing unseen and skipped the fetch.
    pub idle_passes: u64,
    pub messages: usize,
}

/// Polls until shutdown is requested or `max_passes` is reached.
///
/// With `unseen_only`, a pass first asks the transport for its unseen count
/// and skips the full read when it is zero.
pub fn run<T: Transport>(bot: &mut Bot<T>, poll: &PollConfig) -> RunStats {
    let mut stats = RunStats::default();
    let shutdown = bot.shutdown_signal().clone();
    let interval = Duration::from_millis(poll.interval_ms);

    tracing::info!(
        bot = bot.name(),
        interval_ms = poll.interval_ms,
        max_passes = ?poll.max_passes,
        "poll loop started"
    );

    while !shutdown.is_requested() {
        if poll.max_passes.is_some_and(|max| stats.passes >= max) {
            tracing::info!(passes = stats.passes, "pass limit reached");
            break;
        }
        stats.passes += 1;

        if poll.unseen_only && bot.unseen_count() == 0 {
            stats.idle_passes += 1;
        } else {
            let messages = bot.poll_once(poll.unseen_only);
            stats.messages += messages.len();
        }

        if shutdown.is_requested() {
            break;
        }
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    tracing::info!(
        passes = stats.passes,
        idle = stats.idle_passes,
        messages = stats.messages,
        "poll loop stopped"
    );
    stats
}
