use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Connectivity view consumed by the synchronization layer. Queries must
/// never block and must be safe from any calling context.
pub trait NetworkReachability: Send + Sync {
    fn is_connected(&self) -> bool;
    fn start(&self);
    fn stop(&self);
}

/// Host-side sender for transport-path changes.
///
/// The platform integration (NWPathMonitor, ConnectivityManager, ...) pushes
/// every path change through this handle; nothing in the core polls.
#[derive(Clone, Debug)]
pub struct ReachabilityHandle {
    tx: watch::Sender<bool>,
}

impl ReachabilityHandle {
    pub fn set_connected(&self, connected: bool) {
        self.tx.send_replace(connected);
    }
}

/// Event-driven connectivity monitor.
///
/// `start` begins observing path changes; `stop` releases the observation
/// and freezes `is_connected` at its last value. Reads are a single atomic
/// load.
pub struct ReachabilityMonitor {
    connected: Arc<AtomicBool>,
    rx: watch::Receiver<bool>,
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl ReachabilityMonitor {
    /// Returns the monitor and the handle the host feeds path changes into.
    /// The monitor assumes connectivity until told otherwise.
    #[must_use]
    pub fn new() -> (Self, ReachabilityHandle) {
        let (tx, rx) = watch::channel(true);
        let monitor = Self {
            connected: Arc::new(AtomicBool::new(true)),
            rx,
            observer: Mutex::new(None),
        };
        (monitor, ReachabilityHandle { tx })
    }
}

impl NetworkReachability for ReachabilityMonitor {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Begins asynchronous observation. Must be called on a Tokio runtime.
    /// Calling `start` while already observing is a no-op.
    fn start(&self) {
        let mut observer = self.observer.lock().unwrap();
        if observer.is_some() {
            return;
        }

        self.connected.store(*self.rx.borrow(), Ordering::Release);

        let connected = Arc::clone(&self.connected);
        let mut rx = self.rx.clone();
        *observer = Some(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let now = *rx.borrow_and_update();
                connected.store(now, Ordering::Release);
                debug!(connected = now, "network path changed");
            }
        }));
    }

    /// Releases the observation. `is_connected` keeps returning the last
    /// observed value.
    fn stop(&self) {
        if let Some(observer) = self.observer.lock().unwrap().take() {
            observer.abort();
        }
    }
}

impl Drop for ReachabilityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
