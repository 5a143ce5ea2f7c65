//! Inter-task communication channels
//!
//! Static embassy-sync primitives shared between the bridge, the shutdown
//! button and the pipeline task.

use core::sync::atomic::AtomicBool;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use stillweigh_core::bridge::{Receipt, Ticket};

/// One request in flight at a time; the bridge waits for its reply
const BRIDGE_QUEUE_SIZE: usize = 1;

/// Requests from the bridge UART, drained by the orchestrator while monitoring
pub static BRIDGE_REQUESTS: Channel<CriticalSectionRawMutex, Ticket, BRIDGE_QUEUE_SIZE> =
    Channel::new();

/// Status for the request taken last, tagged with its ticket number
pub static BRIDGE_REPLIES: Signal<CriticalSectionRawMutex, Receipt> = Signal::new();

/// Set by the shutdown button; polled by the orchestrator at safe points
pub static SHUTDOWN: AtomicBool = AtomicBool::new(false);
