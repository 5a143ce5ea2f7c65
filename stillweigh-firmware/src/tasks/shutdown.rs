//! Shutdown button task

use core::sync::atomic::Ordering;

use defmt::*;
use embassy_rp::gpio::Input;
use embassy_time::Timer;

use crate::channels::SHUTDOWN;

const DEBOUNCE_MS: u64 = 50;

/// Watch the active-low button and raise `SHUTDOWN` once it is pressed
#[embassy_executor::task]
pub async fn shutdown_button_task(mut button: Input<'static>) {
    info!("Shutdown button task started");

    loop {
        button.wait_for_low().await;
        Timer::after_millis(DEBOUNCE_MS).await;
        if button.is_low() {
            break;
        }
    }

    SHUTDOWN.store(true, Ordering::Release);
    info!("Shutdown requested");
}
