//! Ctrl+C handling for line mode

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Exit status after Ctrl+C at the prompt
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Routes Ctrl+C to the reply in flight, or ends the session when idle.
///
/// `tokio::signal::ctrl_c` keeps its handler for the rest of the process
/// once polled, so a single watcher serves the whole session.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    reply: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupt {
    /// Start watching for Ctrl+C
    pub fn install() -> Self {
        let interrupt = Self::default();
        let watcher = interrupt.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !watcher.fire() {
                    println!();
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
                tracing::debug!("reply interrupted");
            }
        });
        interrupt
    }

    /// Send Ctrl+C to `cancel` until the returned guard drops
    pub fn arm(&self, cancel: CancellationToken) -> Armed<'_> {
        *self.reply.lock() = Some(cancel);
        Armed { interrupt: self }
    }

    /// Cancel the armed reply. Returns false when nothing is streaming.
    fn fire(&self) -> bool {
        match self.reply.lock().as_ref() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }
}

/// Keeps a reply armed for Ctrl+C
pub struct Armed<'a> {
    interrupt: &'a Interrupt,
}

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        *self.interrupt.reply.lock() = None;
    }
}
