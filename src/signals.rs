//! Holding termination signals off while checkouts are on the working branch.
//!
//! Ctrl-C reaches the whole foreground process group, so flatpak-builder gets
//! it and stops on its own. devsdk records the signal instead of dying, which
//! lets the guarded region unwind and restore every checkout before the
//! process exits. A signal sent to devsdk alone (`kill <pid>`) is recorded the
//! same way; the running builder is left to finish.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(unix)]
const DEFERRED: [i32; 3] = [
    signal_hook::consts::SIGINT,
    signal_hook::consts::SIGTERM,
    signal_hook::consts::SIGHUP,
];

/// Records termination signals for as long as it is alive.
///
/// The previous disposition is not reinstated on drop: the signals stay
/// caught but unrecorded for the rest of the process.
#[derive(Debug)]
pub struct DeferredSignals {
    #[cfg(unix)]
    ids: Vec<signal_hook::SigId>,
    received: Arc<AtomicUsize>,
}

impl DeferredSignals {
    /// Start recording `SIGINT`, `SIGTERM` and `SIGHUP`.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        let mut deferred = Self {
            ids: Vec::with_capacity(DEFERRED.len()),
            received: Arc::new(AtomicUsize::new(0)),
        };
        for signal in DEFERRED {
            let id = signal_hook::flag::register_usize(
                signal,
                Arc::clone(&deferred.received),
                signal as usize,
            )?;
            deferred.ids.push(id);
        }
        Ok(deferred)
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            received: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The last signal received since [`DeferredSignals::install`], if any.
    pub fn received(&self) -> Option<i32> {
        match self.received.load(Ordering::SeqCst) {
            0 => None,
            signal => i32::try_from(signal).ok(),
        }
    }
}

#[cfg(unix)]
impl Drop for DeferredSignals {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}
