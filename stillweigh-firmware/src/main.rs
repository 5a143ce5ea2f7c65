//! Stillweigh - Stability-gated weighing firmware
//!
//! Main firmware binary for an RP2040 (Raspberry Pi Pico) scale: waits for
//! the platform to hold still, weighs over a short window and reports the
//! result to a paired phone over Bluetooth SPP.
//!
//! Wiring (Pico GPIO):
//!
//! | Function            | Pins                      |
//! |---------------------|---------------------------|
//! | MPU6050 (I2C0)      | SDA 4, SCL 5              |
//! | HX711               | PD_SCK 14, DOUT 15        |
//! | HC-05 (UART0)       | TX 0, RX 1, KEY 2, STATE 3|
//! | Bridge port (UART1) | TX 8, RX 9                |
//! | Shutdown button     | 16 (active low)           |

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::{I2C0, UART0, UART1};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::Delay;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use stillweigh_core::orchestrator::Peripherals;
use stillweigh_drivers::{Hc05, Hc05Config, Hx711, Hx711Config, Mpu6050};
use stillweigh_hal_rp2040::flash::Rp2040FlashStorage;

mod channels;
mod config;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    UART1_IRQ => BufferedInterruptHandler<UART1>;
    I2C0_IRQ => i2c::InterruptHandler<I2C0>;
});

/// HC-05 factory data-mode baud rate
const HC05_BAUD: u32 = 9_600;
const BRIDGE_BAUD: u32 = 115_200;

// Static cells for UART buffers (must live forever)
static HC05_TX_BUF: StaticCell<[u8; 128]> = StaticCell::new();
static HC05_RX_BUF: StaticCell<[u8; 128]> = StaticCell::new();
static BRIDGE_TX_BUF: StaticCell<[u8; 128]> = StaticCell::new();
static BRIDGE_RX_BUF: StaticCell<[u8; 128]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Stillweigh firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Config first; the same storage then holds the calibration record
    let mut storage = Rp2040FlashStorage::new(p.FLASH, p.DMA_CH0);
    let device_config = config::load_config(&mut storage).await;

    // Gyroscope on I2C0 (400 kHz fast mode)
    let i2c_config = {
        let mut cfg = i2c::Config::default();
        cfg.frequency = 400_000;
        cfg
    };
    let i2c = I2c::new_async(p.I2C0, p.PIN_5, p.PIN_4, Irqs, i2c_config);
    let gyroscope = Mpu6050::new(i2c);

    // HX711: clock idles low (powered up), DOUT pulled up while busy
    let load_cell = Hx711::new(
        Output::new(p.PIN_14, Level::Low),
        Input::new(p.PIN_15, Pull::Up),
        Delay,
        Hx711Config::default(),
    );

    // HC-05 on UART0; KEY low keeps it in data mode
    let hc05_uart_config = {
        let mut cfg = UartConfig::default();
        cfg.baudrate = HC05_BAUD;
        cfg
    };
    let hc05_uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, hc05_uart_config)
        .into_buffered(
            Irqs,
            HC05_TX_BUF.init([0u8; 128]),
            HC05_RX_BUF.init([0u8; 128]),
        );
    let link = Hc05::new(
        hc05_uart,
        Output::new(p.PIN_2, Level::Low),
        Input::new(p.PIN_3, Pull::Down),
        Delay,
        Hc05Config::default(),
    );

    info!("Sensors and radio configured");

    // Bridge command port on UART1
    let bridge_uart_config = {
        let mut cfg = UartConfig::default();
        cfg.baudrate = BRIDGE_BAUD;
        cfg
    };
    let bridge_uart = Uart::new_blocking(p.UART1, p.PIN_8, p.PIN_9, bridge_uart_config)
        .into_buffered(
            Irqs,
            BRIDGE_TX_BUF.init([0u8; 128]),
            BRIDGE_RX_BUF.init([0u8; 128]),
        );

    let shutdown_button = Input::new(p.PIN_16, Pull::Up);

    let peripherals = Peripherals {
        gyroscope,
        load_cell,
        link,
        storage,
    };
    let reply_timeout_ms = tasks::reply_timeout_ms(&device_config);

    // Spawn tasks
    spawner
        .spawn(tasks::bridge_task(bridge_uart, reply_timeout_ms))
        .unwrap();
    spawner
        .spawn(tasks::shutdown_button_task(shutdown_button))
        .unwrap();
    spawner
        .spawn(tasks::pipeline_task(device_config, peripherals))
        .unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
