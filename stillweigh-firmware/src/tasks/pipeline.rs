//! Stability-gated weighing pipeline task

use defmt::*;
use embassy_rp::gpio::{Input, Output};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_rp::uart::BufferedUart;
use embassy_time::{Delay, Instant};

use stillweigh_core::bridge::TicketInbox;
use stillweigh_core::config::DeviceConfig;
use stillweigh_core::orchestrator::{Orchestrator, Peripherals};
use stillweigh_core::traits::Clock;
use stillweigh_drivers::{Hc05, Hx711, Mpu6050};
use stillweigh_hal_rp2040::flash::Rp2040FlashStorage;

use crate::channels::{BRIDGE_REPLIES, BRIDGE_REQUESTS, SHUTDOWN};

pub type Gyro = Mpu6050<I2c<'static, I2C0, i2c::Async>>;
pub type Scale = Hx711<Output<'static>, Input<'static>, Delay>;
pub type Radio = Hc05<BufferedUart, Output<'static>, Input<'static>, Delay>;
pub type Storage = Rp2040FlashStorage<'static>;

/// Milliseconds since boot from the embassy time driver
struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

#[embassy_executor::task]
pub async fn pipeline_task(
    config: DeviceConfig,
    peripherals: Peripherals<Gyro, Scale, Radio, Storage>,
) {
    info!("Pipeline task started");

    let mut orchestrator = Orchestrator::new(config, Delay, EmbassyClock);
    let ctx = match orchestrator.initialize(peripherals).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Hardware init failed: {:?}", e);
            return;
        }
    };

    let mut inbox = TicketInbox::new(
        || BRIDGE_REQUESTS.try_receive().ok(),
        |receipt| BRIDGE_REPLIES.signal(receipt),
    );
    let _hardware = orchestrator.run(ctx, &mut inbox, &SHUTDOWN).await;
    info!("Pipeline stopped in {:?}", orchestrator.state());
}
