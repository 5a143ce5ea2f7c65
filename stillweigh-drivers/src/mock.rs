//! Pin, bus and UART fakes for driver tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::task::Poll;
use std::vec::Vec;

use embedded_hal::digital::{self, ErrorType as PinErrorType};
use embedded_hal::i2c::{self, ErrorKind as I2cErrorKind, NoAcknowledgeSource, Operation};
use embedded_hal_async::delay::DelayNs;
use embedded_io::ErrorKind as IoErrorKind;

/// Output pin that records every level it is driven to
#[derive(Clone, Default)]
pub struct MockOutputPin {
    pub log: Rc<RefCell<Vec<bool>>>,
}

impl MockOutputPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        self.log.borrow().clone()
    }

    pub fn rising_edges(&self) -> usize {
        let log = self.log.borrow();
        log.windows(2).filter(|w| !w[0] && w[1]).count()
            + usize::from(log.first() == Some(&true))
    }

    pub fn last(&self) -> Option<bool> {
        self.log.borrow().last().copied()
    }
}

impl PinErrorType for MockOutputPin {
    type Error = digital::ErrorKind;
}

impl digital::OutputPin for MockOutputPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(true);
        Ok(())
    }
}

/// Input pin fed from a script of sampled levels
///
/// `wait_for_low`/`wait_for_high` check the resting `level` on every poll
/// and stay pending until it matches.
#[derive(Clone, Default)]
pub struct MockInputPin {
    pub samples: Rc<RefCell<VecDeque<bool>>>,
    pub level: Rc<RefCell<bool>>,
}

impl MockInputPin {
    pub fn resting(level: bool) -> Self {
        let pin = Self::default();
        *pin.level.borrow_mut() = level;
        pin
    }

    /// Data line that is ready (low) and shifts out `words` MSB first
    pub fn with_words(words: &[u32]) -> Self {
        let pin = Self::resting(false);
        for &word in words {
            pin.push_word(word);
        }
        pin
    }

    pub fn push_word(&self, word: u32) {
        let mut samples = self.samples.borrow_mut();
        for bit in (0..24).rev() {
            samples.push_back((word >> bit) & 1 == 1);
        }
    }

    pub fn set_level(&self, level: bool) {
        *self.level.borrow_mut() = level;
    }

    fn sample(&self) -> bool {
        self.samples
            .borrow_mut()
            .pop_front()
            .unwrap_or(*self.level.borrow())
    }
}

impl PinErrorType for MockInputPin {
    type Error = digital::ErrorKind;
}

impl digital::InputPin for MockInputPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.sample())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.sample())
    }
}

impl MockInputPin {
    async fn wait_for_level(&self, high: bool) {
        core::future::poll_fn(|_| {
            if *self.level.borrow() == high {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

impl embedded_hal_async::digital::Wait for MockInputPin {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        self.wait_for_level(true).await;
        Ok(())
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        self.wait_for_level(false).await;
        Ok(())
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        self.wait_for_high().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        self.wait_for_low().await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        core::future::pending::<()>().await;
        Ok(())
    }
}

/// Delay that returns at once and tallies requested time
#[derive(Clone, Default)]
pub struct CountingDelay {
    pub elapsed_ns: Rc<RefCell<u64>>,
}

impl CountingDelay {
    pub fn elapsed_us(&self) -> u64 {
        *self.elapsed_ns.borrow() / 1_000
    }
}

impl DelayNs for CountingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        *self.elapsed_ns.borrow_mut() += ns as u64;
    }
}

/// Register-file I2C device
pub struct MockI2c {
    pub address: u8,
    pub registers: [u8; 128],
    pub writes: Vec<(u8, u8)>,
    pub fail: bool,
    pointer: usize,
}

impl MockI2c {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 128],
            writes: Vec::new(),
            fail: false,
            pointer: 0,
        }
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = I2cErrorKind;
}

impl embedded_hal_async::i2c::I2c for MockI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err(I2cErrorKind::Bus);
        }
        if address != self.address {
            return Err(I2cErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if let Some((&reg, values)) = bytes.split_first() {
                        self.pointer = reg as usize;
                        for &value in values {
                            self.registers[self.pointer] = value;
                            self.writes.push((self.pointer as u8, value));
                            self.pointer += 1;
                        }
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.registers[self.pointer];
                        self.pointer += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Shared view of what a [`MockUart`] has transmitted
#[derive(Clone, Default)]
pub struct UartLog {
    pub tx: Rc<RefCell<Vec<u8>>>,
    pub rx: Rc<RefCell<VecDeque<u8>>>,
}

impl UartLog {
    pub fn sent(&self) -> String {
        String::from_utf8(self.tx.borrow().clone()).unwrap()
    }

    pub fn reply(&self, text: &str) {
        self.rx.borrow_mut().extend(text.bytes());
    }
}

/// UART whose replies are queued through a [`UartLog`]; reads pend when idle
pub struct MockUart {
    log: UartLog,
}

impl MockUart {
    pub fn new() -> (Self, UartLog) {
        let log = UartLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl embedded_io::ErrorType for MockUart {
    type Error = IoErrorKind;
}

impl embedded_io_async::Read for MockUart {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoErrorKind> {
        let mut rx = self.log.rx.borrow_mut();
        if rx.is_empty() {
            drop(rx);
            core::future::pending::<()>().await;
            return Ok(0);
        }
        let n = buf.len().min(rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = rx.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for MockUart {
    fn read_ready(&mut self) -> Result<bool, IoErrorKind> {
        Ok(!self.log.rx.borrow().is_empty())
    }
}

impl embedded_io_async::Write for MockUart {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, IoErrorKind> {
        self.log.tx.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), IoErrorKind> {
        Ok(())
    }
}
