//! Scripted fakes for host tests

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;
use embedded_io::ErrorKind;

use crate::traits::{
    AngularRates, Clock, Gyroscope, LinkError, LoadCell, PeerEndpoint, PeerLink, SensorError,
    ServiceUuid,
};

/// Shared millisecond clock advanced only by [`StepDelay`]
#[derive(Clone, Default)]
pub struct ManualClock {
    nanos: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.nanos.get() / 1_000_000
    }

    pub fn advance_ms(&self, ms: u64) {
        self.nanos.set(self.nanos.get() + ms * 1_000_000);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now()
    }
}

/// Delay that completes immediately and moves the clock forward
pub struct StepDelay {
    clock: ManualClock,
}

impl StepDelay {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            clock: clock.clone(),
        }
    }
}

impl DelayNs for StepDelay {
    async fn delay_ns(&mut self, ns: u32) {
        let nanos = &self.clock.nanos;
        nanos.set(nanos.get() + ns as u64);
    }
}

enum Fallback<T> {
    Value(T),
    Fail(SensorError),
}

/// Load cell replaying a script, then a fallback
pub struct ScriptedLoadCell {
    script: VecDeque<Result<f64, SensorError>>,
    fallback: Fallback<f64>,
    pub init_result: Result<(), SensorError>,
    pub power_down_result: Result<(), SensorError>,
    pub reads: usize,
    pub inits: usize,
    pub power_ups: usize,
    pub power_downs: usize,
    pub resets: usize,
    pub powered: bool,
}

impl ScriptedLoadCell {
    fn build(script: VecDeque<Result<f64, SensorError>>, fallback: Fallback<f64>) -> Self {
        Self {
            script,
            fallback,
            init_result: Ok(()),
            power_down_result: Ok(()),
            reads: 0,
            inits: 0,
            power_ups: 0,
            power_downs: 0,
            resets: 0,
            powered: true,
        }
    }

    /// Replay `script`, then fail with `Timeout`
    pub fn new(script: impl IntoIterator<Item = Result<f64, SensorError>>) -> Self {
        Self::build(
            script.into_iter().collect(),
            Fallback::Fail(SensorError::Timeout),
        )
    }

    pub fn constant(raw: f64) -> Self {
        Self::build(VecDeque::new(), Fallback::Value(raw))
    }

    pub fn failing(error: SensorError) -> Self {
        Self::build(VecDeque::new(), Fallback::Fail(error))
    }

    /// Replay `script`, then return `raw` forever
    pub fn then_constant(mut self, raw: f64) -> Self {
        self.fallback = Fallback::Value(raw);
        self
    }

    /// Append readings to the script
    pub fn push(&mut self, readings: impl IntoIterator<Item = Result<f64, SensorError>>) {
        self.script.extend(readings);
    }
}

impl LoadCell for ScriptedLoadCell {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.inits += 1;
        self.init_result
    }

    async fn read_raw(&mut self) -> Result<f64, SensorError> {
        self.reads += 1;
        match self.script.pop_front() {
            Some(r) => r,
            None => match self.fallback {
                Fallback::Value(v) => Ok(v),
                Fallback::Fail(e) => Err(e),
            },
        }
    }

    async fn power_up(&mut self) -> Result<(), SensorError> {
        self.power_ups += 1;
        self.powered = true;
        Ok(())
    }

    async fn power_down(&mut self) -> Result<(), SensorError> {
        self.power_downs += 1;
        self.power_down_result?;
        self.powered = false;
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), SensorError> {
        self.resets += 1;
        self.powered = true;
        Ok(())
    }
}

/// Gyroscope replaying a script, then a fallback
pub struct ScriptedGyro {
    script: VecDeque<Result<AngularRates, SensorError>>,
    fallback: Fallback<AngularRates>,
    pub init_result: Result<(), SensorError>,
    pub sleep_result: Result<(), SensorError>,
    pub reads: usize,
    pub sleeps: usize,
}

impl ScriptedGyro {
    pub fn new(script: impl IntoIterator<Item = Result<AngularRates, SensorError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: Fallback::Value(AngularRates::zero()),
            init_result: Ok(()),
            sleep_result: Ok(()),
            reads: 0,
            sleeps: 0,
        }
    }

    /// Always still
    pub fn still() -> Self {
        Self::new([])
    }

    pub fn constant(rates: AngularRates) -> Self {
        let mut gyro = Self::new([]);
        gyro.fallback = Fallback::Value(rates);
        gyro
    }

    pub fn failing(error: SensorError) -> Self {
        let mut gyro = Self::new([]);
        gyro.fallback = Fallback::Fail(error);
        gyro
    }
}

impl Gyroscope for ScriptedGyro {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.init_result
    }

    async fn read_angular_rates(&mut self) -> Result<AngularRates, SensorError> {
        self.reads += 1;
        match self.script.pop_front() {
            Some(r) => r,
            None => match self.fallback {
                Fallback::Value(v) => Ok(v),
                Fallback::Fail(e) => Err(e),
            },
        }
    }

    async fn sleep(&mut self) -> Result<(), SensorError> {
        self.sleeps += 1;
        self.sleep_result
    }
}

/// One scripted receive event
pub enum Rx {
    Data(&'static [u8]),
    Eof,
    Error,
}

/// Byte stream replaying received data; pends forever once drained
///
/// Scripted `rx` events arrive only once a read waits for them, so they
/// never count as already buffered. Bytes passed to [`MockTransport::arrive`]
/// are buffered immediately and reported by `read_ready`.
#[derive(Default)]
pub struct MockTransport {
    rx: VecDeque<Rx>,
    partial: Vec<u8>,
    buffered: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub fail_writes: bool,
}

impl MockTransport {
    pub fn new(rx: impl IntoIterator<Item = Rx>) -> Self {
        Self {
            rx: rx.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &str {
        std::str::from_utf8(&self.tx).unwrap()
    }

    /// Bytes that have reached the receive buffer
    pub fn arrive(&mut self, bytes: &[u8]) {
        self.buffered.extend(bytes.iter().copied());
    }
}

impl embedded_io::ErrorType for MockTransport {
    type Error = ErrorKind;
}

impl embedded_io_async::Read for MockTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        if !self.buffered.is_empty() {
            let n = buf.len().min(self.buffered.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.buffered.pop_front().unwrap();
            }
            return Ok(n);
        }
        if self.partial.is_empty() {
            match self.rx.pop_front() {
                Some(Rx::Data(bytes)) => self.partial.extend_from_slice(bytes),
                Some(Rx::Eof) => return Ok(0),
                Some(Rx::Error) => return Err(ErrorKind::BrokenPipe),
                None => loop {
                    core::future::pending::<()>().await;
                },
            }
        }
        let n = buf.len().min(self.partial.len());
        buf[..n].copy_from_slice(&self.partial[..n]);
        self.partial.drain(..n);
        Ok(n)
    }
}

impl embedded_io::ReadReady for MockTransport {
    fn read_ready(&mut self) -> Result<bool, ErrorKind> {
        Ok(!self.buffered.is_empty())
    }
}

impl embedded_io_async::Write for MockTransport {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        if self.fail_writes {
            return Err(ErrorKind::BrokenPipe);
        }
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }
}

/// Peer link handing out prepared transports
pub struct MockLink {
    pub discovery: Result<Option<PeerEndpoint>, LinkError>,
    pub connect_error: Option<LinkError>,
    pub accept_pends: bool,
    pub transports: VecDeque<MockTransport>,
    pub connected_to: Vec<PeerEndpoint>,
    pub accepts: usize,
    pub released: Vec<MockTransport>,
}

impl MockLink {
    pub fn new(transports: impl IntoIterator<Item = MockTransport>) -> Self {
        Self {
            discovery: Ok(None),
            connect_error: None,
            accept_pends: false,
            transports: transports.into_iter().collect(),
            connected_to: Vec::new(),
            accepts: 0,
            released: Vec::new(),
        }
    }
}

impl PeerLink for MockLink {
    type Transport = MockTransport;

    async fn find_service(
        &mut self,
        _service: &ServiceUuid,
    ) -> Result<Option<PeerEndpoint>, LinkError> {
        self.discovery
    }

    async fn connect(&mut self, endpoint: &PeerEndpoint) -> Result<MockTransport, LinkError> {
        if let Some(e) = self.connect_error {
            return Err(e);
        }
        self.connected_to.push(*endpoint);
        self.transports.pop_front().ok_or(LinkError::Busy)
    }

    async fn accept(&mut self, _service: &ServiceUuid) -> Result<MockTransport, LinkError> {
        self.accepts += 1;
        if self.accept_pends {
            loop {
                core::future::pending::<()>().await;
            }
        }
        self.transports.pop_front().ok_or(LinkError::NoResponse)
    }

    async fn release(&mut self, transport: MockTransport) {
        self.released.push(transport);
    }
}
