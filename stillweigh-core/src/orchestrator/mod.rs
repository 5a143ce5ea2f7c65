//! Pipeline orchestration
//!
//! Owns the state machine and the timing sources, and drives:
//!
//! ```text
//! Init ─▶ Monitoring ─(settled)─▶ Acquiring ─▶ Delivering ─┐
//!             ▲   │                   │                      │
//!             │   └──(bridge)─────────┼──────▶ Delivering ───┤
//!             └───────────────────────┴──────────────────────┘
//! any ─(stop)─▶ ShuttingDown ─▶ Terminated
//! ```
//!
//! The stop signal is checked at the top of every loop iteration, which is
//! also the entry of each state; a sample or an acknowledgement wait is
//! never interrupted midway.

pub mod context;

pub use context::{Context, HardwareInitFailure, Peripherals};

use embedded_hal_async::delay::DelayNs;
use stillweigh_hal::FlashStorage;
use stillweigh_protocol::{weight_report, Message, StatusCode};

use crate::acquisition::WeightAcquirer;
use crate::bridge::{delivery_status, BridgeInbox, BridgeRequest};
use crate::calibration::{perform_tare, CalibrationRecord, CalibrationStore, LoadError};
use crate::config::DeviceConfig;
use crate::delivery::{establish, DeliveryResult};
use crate::stability::StabilityMonitor;
use crate::state::{Event, OrchestratorState};
use crate::traits::{Clock, Gyroscope, LoadCell, PeerLink, StopSignal};

/// Runs the pipeline from `Init` to `Terminated`
pub struct Orchestrator<D, C> {
    config: DeviceConfig,
    state: OrchestratorState,
    delay: D,
    clock: C,
    monitor: StabilityMonitor,
}

impl<D: DelayNs, C: Clock> Orchestrator<D, C> {
    pub fn new(config: DeviceConfig, delay: D, clock: C) -> Self {
        Self {
            monitor: StabilityMonitor::new(&config.stability),
            config,
            state: OrchestratorState::Init,
            delay,
            clock,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn apply(&mut self, event: Event) {
        let next = self.state.transition(event);
        if next != self.state {
            debug!("State {:?} -> {:?} on {:?}", self.state, next, event);
        }
        self.state = next;
    }

    /// Bring up sensors, bind calibration and try to open the channel
    ///
    /// Missing or invalid calibration triggers a fresh tare (and baseline
    /// capture when configured). A channel failure is not fatal; delivery
    /// retries the connection when it next has something to send.
    pub async fn initialize<G, L, P, S>(
        &mut self,
        peripherals: Peripherals<G, L, P, S>,
    ) -> Result<Context<G, L, P, S>, HardwareInitFailure>
    where
        G: Gyroscope,
        L: LoadCell,
        P: PeerLink,
        S: FlashStorage,
    {
        let Peripherals {
            mut gyroscope,
            mut load_cell,
            mut link,
            storage,
        } = peripherals;

        info!("Initializing");

        if let Err(e) = gyroscope.init().await {
            error!("Gyroscope init failed: {:?}", e);
            power_down(&mut load_cell).await;
            self.fail_init();
            return Err(HardwareInitFailure::Gyroscope(e));
        }

        if let Err(e) = load_cell.init().await {
            error!("Load cell init failed: {:?}", e);
            sleep(&mut gyroscope).await;
            power_down(&mut load_cell).await;
            self.fail_init();
            return Err(HardwareInitFailure::LoadCell(e));
        }

        let mut store = CalibrationStore::new(storage);
        let record = match store.load().await {
            Ok(record) => {
                info!(
                    "Loaded calibration: offset {} reference unit {}",
                    record.offset(),
                    record.reference_unit()
                );
                record
            }
            Err(reason) => {
                match reason {
                    LoadError::NotFound => info!("No stored calibration, taring"),
                    other => warn!("Stored calibration unusable ({:?}), taring", other),
                }
                match self.calibrate(&mut load_cell, &mut store).await {
                    Some(record) => record,
                    None => {
                        sleep(&mut gyroscope).await;
                        power_down(&mut load_cell).await;
                        self.fail_init();
                        return Err(HardwareInitFailure::Calibration);
                    }
                }
            }
        };

        let channel = match establish(&mut link, &self.config.delivery, &mut self.delay).await {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!("Delivery channel not available yet: {:?}", e);
                None
            }
        };

        self.apply(Event::Initialized);
        Ok(Context {
            gyroscope,
            load_cell,
            link,
            store,
            acquirer: WeightAcquirer::new(record),
            channel,
        })
    }

    fn fail_init(&mut self) {
        self.apply(Event::InitFailed);
        self.apply(Event::ShutdownComplete);
    }

    /// Fresh tare, optional baseline capture, then save
    async fn calibrate<L, S>(
        &mut self,
        load_cell: &mut L,
        store: &mut CalibrationStore<S>,
    ) -> Option<CalibrationRecord>
    where
        L: LoadCell,
        S: FlashStorage,
    {
        if let Err(e) = load_cell.reset().await {
            warn!("Load cell reset failed: {:?}", e);
        }

        let offset = match perform_tare(load_cell, &mut self.delay, &self.config.tare).await {
            Ok(offset) => offset,
            Err(e) => {
                error!("Tare failed: {:?}", e);
                return None;
            }
        };

        let mut record =
            CalibrationRecord::new(offset, self.config.tare.default_reference_unit).ok()?;

        if self.config.tare.capture_baseline {
            info!(
                "Place the reference item; measuring in {} ms",
                self.config.tare.baseline_capture_delay_ms
            );
            self.delay
                .delay_ms(self.config.tare.baseline_capture_delay_ms)
                .await;

            let acquirer = WeightAcquirer::new(record);
            match acquirer
                .acquire(load_cell, &mut self.delay, &self.clock, &self.config.acquisition)
                .await
            {
                Ok(m) => match record.with_baseline(m.measured) {
                    Ok(with_baseline) => {
                        info!("Baseline weight {}", m.measured);
                        record = with_baseline;
                    }
                    Err(e) => warn!("Baseline rejected: {:?}", e),
                },
                Err(e) => {
                    warn!("Baseline capture failed: {:?}", e);
                    power_down(load_cell).await;
                }
            }
        }

        match store.save(&record).await {
            Ok(()) => info!("Saved calibration"),
            Err(e) => warn!("Failed to save calibration: {:?}, continuing", e),
        }
        Some(record)
    }

    /// Main loop; returns the hardware once shut down
    pub async fn run<G, L, P, S, B, X>(
        &mut self,
        mut ctx: Context<G, L, P, S>,
        inbox: &mut B,
        stop: &X,
    ) -> Peripherals<G, L, P, S>
    where
        G: Gyroscope,
        L: LoadCell,
        P: PeerLink,
        S: FlashStorage,
        B: BridgeInbox,
        X: StopSignal,
    {
        let mut pending: Option<Message> = None;

        while self.state.is_running() {
            if stop.stop_requested() {
                info!("Stop requested in {:?}", self.state);
                self.apply(Event::StopRequested);
                break;
            }

            match self.state {
                OrchestratorState::Monitoring => {
                    if let Some(request) = inbox.try_next() {
                        let status = self.handle_request(&mut ctx, request).await;
                        inbox.reply(status);
                        self.monitor.reset();
                        continue;
                    }
                    let settled = self
                        .monitor
                        .poll(&mut ctx.gyroscope, &mut self.delay, &self.clock)
                        .await;
                    if settled.is_some() {
                        self.apply(Event::Settled);
                    }
                }
                OrchestratorState::Acquiring => {
                    pending = self.acquire(&mut ctx).await;
                    if pending.is_some() {
                        self.apply(Event::AcquisitionSucceeded);
                    } else {
                        self.apply(Event::AcquisitionFailed);
                        self.pause().await;
                    }
                }
                OrchestratorState::Delivering => {
                    if let Some(message) = pending.take() {
                        self.deliver(&mut ctx, &message).await;
                    }
                    self.apply(Event::DeliveryFinished);
                    self.pause().await;
                }
                _ => break,
            }
        }

        self.shutdown(ctx).await
    }

    /// One acquisition; `None` when nothing can be reported
    async fn acquire<G, L, P, S>(&mut self, ctx: &mut Context<G, L, P, S>) -> Option<Message>
    where
        L: LoadCell,
        P: PeerLink,
        S: FlashStorage,
    {
        let measurement = match ctx
            .acquirer
            .acquire(
                &mut ctx.load_cell,
                &mut self.delay,
                &self.clock,
                &self.config.acquisition,
            )
            .await
        {
            Ok(m) => m,
            Err(e) => {
                warn!("Acquisition failed: {:?}", e);
                power_down(&mut ctx.load_cell).await;
                return None;
            }
        };

        info!(
            "Weight {} ({} samples, {} discarded)",
            measurement.weight, measurement.valid, measurement.discarded
        );
        if let Some(percent) = measurement.percent_of(ctx.record().baseline_weight()) {
            info!("{} percent of baseline", percent);
        }

        match weight_report(measurement.weight) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Cannot format weight: {:?}", e);
                None
            }
        }
    }

    /// Send one message, connecting first if needed
    async fn deliver<G, L, P, S>(
        &mut self,
        ctx: &mut Context<G, L, P, S>,
        message: &str,
    ) -> DeliveryResult
    where
        P: PeerLink,
        S: FlashStorage,
    {
        if ctx.channel.is_none() {
            match establish(&mut ctx.link, &self.config.delivery, &mut self.delay).await {
                Ok(channel) => ctx.channel = Some(channel),
                Err(e) => {
                    let result = DeliveryResult::from(e);
                    warn!("Delivery not attempted: {:?}", result);
                    return result;
                }
            }
        }

        let Some(channel) = ctx.channel.as_mut() else {
            return DeliveryResult::TransportError;
        };
        let result = channel
            .send(message, self.config.delivery.ack_timeout_ms, &mut self.delay)
            .await;

        match result {
            DeliveryResult::Confirmed => info!("Delivery confirmed"),
            other => warn!("Delivery result: {:?}", other),
        }

        if result == DeliveryResult::TransportError {
            if let Some(channel) = ctx.channel.take() {
                ctx.link.release(channel.into_transport()).await;
            }
        }
        result
    }

    async fn handle_request<G, L, P, S>(
        &mut self,
        ctx: &mut Context<G, L, P, S>,
        request: BridgeRequest,
    ) -> StatusCode
    where
        L: LoadCell,
        P: PeerLink,
        S: FlashStorage,
    {
        match request {
            BridgeRequest::Deliver(message) => {
                self.apply(Event::DeliveryRequested);
                let result = self.deliver(ctx, &message).await;
                self.apply(Event::DeliveryFinished);
                delivery_status(result)
            }
            BridgeRequest::Retare => self.retare(ctx).await,
        }
    }

    /// Re-zero the load cell, keeping scale and baseline
    async fn retare<G, L, P, S>(&mut self, ctx: &mut Context<G, L, P, S>) -> StatusCode
    where
        L: LoadCell,
        P: PeerLink,
        S: FlashStorage,
    {
        let offset = match perform_tare(&mut ctx.load_cell, &mut self.delay, &self.config.tare).await
        {
            Ok(offset) => offset,
            Err(e) => {
                warn!("Re-tare failed: {:?}", e);
                power_down(&mut ctx.load_cell).await;
                return StatusCode::TareFailed;
            }
        };

        let record = match ctx.record().with_offset(offset) {
            Ok(record) => record,
            Err(e) => {
                warn!("Re-tare produced invalid record: {:?}", e);
                return StatusCode::TareFailed;
            }
        };
        ctx.acquirer.rebind(record);
        if let Err(e) = ctx.store.save(&record).await {
            warn!("Failed to save calibration: {:?}, continuing", e);
        }
        info!("Re-tared, offset {}", offset);
        StatusCode::Ok
    }

    async fn pause(&mut self) {
        self.delay
            .delay_ms(self.config.acquisition.post_trigger_pause_ms)
            .await;
        self.monitor.reset();
    }

    /// Power down sensors, close the channel and hand the hardware back
    pub async fn shutdown<G, L, P, S>(&mut self, ctx: Context<G, L, P, S>) -> Peripherals<G, L, P, S>
    where
        G: Gyroscope,
        L: LoadCell,
        P: PeerLink,
        S: FlashStorage,
    {
        self.apply(Event::StopRequested);
        info!("Shutting down");

        let Context {
            mut gyroscope,
            mut load_cell,
            mut link,
            store,
            channel,
            ..
        } = ctx;

        power_down(&mut load_cell).await;
        sleep(&mut gyroscope).await;
        if let Some(channel) = channel {
            link.release(channel.into_transport()).await;
        }

        self.apply(Event::ShutdownComplete);
        info!("Terminated");

        Peripherals {
            gyroscope,
            load_cell,
            link,
            storage: store.into_inner(),
        }
    }
}

/// Best-effort load cell power down; a failure is logged
async fn power_down<L: LoadCell>(load_cell: &mut L) {
    if let Err(e) = load_cell.power_down().await {
        warn!("Load cell power down failed: {:?}", e);
    }
}

/// Best-effort gyroscope sleep; a failure is logged
async fn sleep<G: Gyroscope>(gyroscope: &mut G) {
    if let Err(e) = gyroscope.sleep().await {
        warn!("Gyroscope sleep failed: {:?}", e);
    }
}
