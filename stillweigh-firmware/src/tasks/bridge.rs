//! Bridge UART task
//!
//! Reads `SEND <payload>` / `TARE` lines, queues them for the orchestrator
//! and writes back one status line per request.

use defmt::*;
use embassy_rp::uart::BufferedUart;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{Read, Write};

use stillweigh_core::bridge::{await_receipt, BridgeRequest, Sequencer, Ticket};
use stillweigh_core::config::DeviceConfig;
use stillweigh_protocol::{LineParser, StatusCode};

use crate::channels::{BRIDGE_REPLIES, BRIDGE_REQUESTS, SHUTDOWN};

const RX_BUF_SIZE: usize = 64;

/// Slack on top of the longest orchestrator step
const REPLY_MARGIN_MS: u32 = 5_000;

/// Longest a request can wait: one full acquire-and-deliver cycle
/// (including a lazy reconnect), then the request itself.
pub fn reply_timeout_ms(config: &DeviceConfig) -> u32 {
    let connect = config
        .delivery
        .accept_timeout_ms
        .saturating_add(config.delivery.ack_timeout_ms);
    let tare = (config.tare.samples as u32)
        .saturating_mul(config.tare.sample_interval_ms)
        .saturating_add(config.tare.power_cycle_ms);
    let cycle = config
        .acquisition
        .window_ms
        .saturating_add(config.acquisition.post_trigger_pause_ms)
        .saturating_add(connect);
    cycle
        .saturating_add(connect.max(tare))
        .saturating_add(REPLY_MARGIN_MS)
}

#[embassy_executor::task]
pub async fn bridge_task(mut uart: BufferedUart, reply_timeout_ms: u32) {
    info!("Bridge task started");

    let mut parser: LineParser = LineParser::new();
    let mut sequencer = Sequencer::new();
    let mut buf = [0u8; RX_BUF_SIZE];
    let timeout = Duration::from_millis(reply_timeout_ms as u64);

    loop {
        let n = match uart.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Bridge UART read error: {:?}", e);
                continue;
            }
        };

        for &byte in &buf[..n] {
            let line = match parser.feed(byte) {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Bridge line dropped: {:?}", e);
                    continue;
                }
            };

            let status = match BridgeRequest::from_line(&line) {
                Ok(request) => forward(sequencer.issue(request), timeout).await,
                Err(status) => status,
            };
            debug!("Bridge reply {=str}", status.as_str());

            if let Err(e) = write_status(&mut uart, status).await {
                warn!("Bridge UART write error: {:?}", e);
            }
        }
    }
}

async fn forward(ticket: Ticket, timeout: Duration) -> StatusCode {
    if SHUTDOWN.load(core::sync::atomic::Ordering::Acquire) {
        return StatusCode::CommunicationError;
    }
    let seq = ticket.seq;
    let exchange = async {
        BRIDGE_REQUESTS.send(ticket).await;
        // A request that timed out earlier may still answer late
        await_receipt(seq, || BRIDGE_REPLIES.wait()).await
    };
    match with_timeout(timeout, exchange).await {
        Ok(status) => status,
        Err(_) => {
            warn!("Orchestrator did not answer bridge request {}", seq);
            // Drop a request nobody picked up so it cannot run late
            if BRIDGE_REQUESTS.try_receive().is_ok() {
                debug!("Dropped unclaimed bridge request {}", seq);
            }
            StatusCode::CommunicationError
        }
    }
}

async fn write_status(
    uart: &mut BufferedUart,
    status: StatusCode,
) -> Result<(), embassy_rp::uart::Error> {
    uart.write_all(status.as_str().as_bytes()).await?;
    uart.write_all(b"\n").await?;
    uart.flush().await
}
