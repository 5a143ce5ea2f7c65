//! HC-05 Bluetooth SPP module
//!
//! The module bridges one RFCOMM connection to its UART. Driving KEY high
//! switches it into AT command mode; STATE reads high while a peer is
//! connected. Once connected the UART is handed out, together with the
//! STATE pin, as an [`Hc05Transport`] and comes back through
//! [`PeerLink::release`].
//!
//! The module keeps its UART alive after the peer disconnects, so the
//! transport watches STATE while reading and writing and reports a low
//! level as `NotConnected`.
//!
//! The module cannot browse SDP records, so service lookup resolves to the
//! peer it is bound to (`AT+BIND?`), if any.

use core::fmt::Write as _;

use embassy_futures::select::{select, Either};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_io::{Error as _, ErrorKind, ErrorType, ReadReady};
use embedded_io_async::{Read, Write};
use heapless::String;
use stillweigh_core::traits::{BdAddr, LinkError, PeerEndpoint, PeerLink, ServiceUuid};
use stillweigh_protocol::LineParser;

/// Longest AT response line kept
const REPLY_LEN: usize = 64;

type Reply = String<REPLY_LEN>;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hc05Config {
    /// Deadline for ordinary AT commands
    pub command_timeout_ms: u32,
    /// Deadline for `AT+LINK` (includes paging the peer)
    pub connect_timeout_ms: u32,
    /// Settling time after toggling KEY
    pub mode_switch_delay_ms: u32,
    /// RFCOMM channel reported for the bound peer
    pub channel: u8,
}

impl Default for Hc05Config {
    fn default() -> Self {
        Self {
            command_timeout_ms: 1_000,
            connect_timeout_ms: 10_000,
            mode_switch_delay_ms: 50,
            channel: 1,
        }
    }
}

/// UART plus STATE pin of a connected module
pub struct Hc05Transport<U, STATE> {
    uart: U,
    state_pin: STATE,
}

impl<U, STATE> Hc05Transport<U, STATE>
where
    STATE: InputPin + Wait,
{
    /// STATE still reads high
    pub fn is_connected(&mut self) -> bool {
        matches!(self.state_pin.is_high(), Ok(true))
    }
}

impl<U: ErrorType, STATE> ErrorType for Hc05Transport<U, STATE> {
    type Error = ErrorKind;
}

impl<U, STATE> Read for Hc05Transport<U, STATE>
where
    U: Read,
    STATE: InputPin + Wait,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        match select(self.uart.read(buf), self.state_pin.wait_for_low()).await {
            Either::First(result) => result.map_err(|e| e.kind()),
            Either::Second(_) => {
                info!("HC-05 peer disconnected");
                Err(ErrorKind::NotConnected)
            }
        }
    }
}

impl<U, STATE> Write for Hc05Transport<U, STATE>
where
    U: Write,
    STATE: InputPin + Wait,
{
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        match select(self.uart.write(buf), self.state_pin.wait_for_low()).await {
            Either::First(result) => result.map_err(|e| e.kind()),
            Either::Second(_) => Err(ErrorKind::NotConnected),
        }
    }

    async fn flush(&mut self) -> Result<(), ErrorKind> {
        self.uart.flush().await.map_err(|e| e.kind())
    }
}

impl<U: ReadReady, STATE> ReadReady for Hc05Transport<U, STATE> {
    fn read_ready(&mut self) -> Result<bool, ErrorKind> {
        self.uart.read_ready().map_err(|e| e.kind())
    }
}

pub struct Hc05<U, KEY, STATE, D> {
    /// `None` while handed out
    port: Option<Hc05Transport<U, STATE>>,
    key_pin: KEY,
    delay: D,
    parser: LineParser<REPLY_LEN>,
    config: Hc05Config,
}

impl<U, KEY, STATE, D> Hc05<U, KEY, STATE, D>
where
    U: Read + Write,
    KEY: OutputPin,
    STATE: InputPin + Wait,
    D: DelayNs,
{
    pub fn new(uart: U, key_pin: KEY, state_pin: STATE, delay: D, config: Hc05Config) -> Self {
        Self {
            port: Some(Hc05Transport { uart, state_pin }),
            key_pin,
            delay,
            parser: LineParser::new(),
            config,
        }
    }

    /// `true` while the UART is handed out as a transport
    pub fn is_busy(&self) -> bool {
        self.port.is_none()
    }

    async fn set_command_mode(&mut self, enabled: bool) -> Result<(), LinkError> {
        let result = if enabled {
            self.key_pin.set_high()
        } else {
            self.key_pin.set_low()
        };
        result.map_err(|_| LinkError::Io)?;
        self.delay.delay_ms(self.config.mode_switch_delay_ms).await;
        Ok(())
    }

    /// Send one AT command and wait for `OK`
    ///
    /// Returns the last `+...` information line seen before `OK`.
    async fn command(&mut self, command: &str, timeout_ms: u32) -> Result<Option<Reply>, LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::Busy)?;
        self.parser.reset();
        let reply = exchange(&mut port.uart, &mut self.parser, command);
        match select(reply, self.delay.delay_ms(timeout_ms)).await {
            Either::First(result) => result,
            Either::Second(()) => {
                warn!("HC-05 no answer to {=str}", command);
                Err(LinkError::NoResponse)
            }
        }
    }

    async fn link(&mut self, address: &BdAddr) -> Result<(), LinkError> {
        // Already-initialised modules answer ERROR:(17)
        if let Err(e) = self.command("AT+INIT", self.config.command_timeout_ms).await {
            debug!("HC-05 AT+INIT: {:?}", e);
        }
        let command = link_command(address)?;
        self.command(&command, self.config.connect_timeout_ms)
            .await
            .map(|_| ())
    }
}

async fn exchange<U: Read + Write>(
    uart: &mut U,
    parser: &mut LineParser<REPLY_LEN>,
    command: &str,
) -> Result<Option<Reply>, LinkError> {
    uart.write_all(command.as_bytes())
        .await
        .map_err(|_| LinkError::Io)?;
    uart.write_all(b"\r\n").await.map_err(|_| LinkError::Io)?;
    uart.flush().await.map_err(|_| LinkError::Io)?;

    let mut info = None;
    let mut byte = [0u8; 1];
    loop {
        // One byte at a time so nothing after the final line is swallowed
        if uart.read(&mut byte).await.map_err(|_| LinkError::Io)? == 0 {
            return Err(LinkError::Io);
        }
        let line = match parser.feed(byte[0]) {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => continue,
        };
        let text = line.trim();
        if text == "OK" {
            return Ok(info);
        }
        if text.starts_with("ERROR") || text == "FAIL" {
            debug!("HC-05 replied {=str}", text);
            return Err(LinkError::ConnectFailed);
        }
        if text.starts_with('+') {
            info = Some(line);
        }
    }
}

/// `AT+LINK=NAP,UAP,LAP`
fn link_command(address: &BdAddr) -> Result<String<32>, LinkError> {
    let a = address.0;
    let mut command = String::new();
    write!(
        command,
        "AT+LINK={:02x}{:02x},{:02x},{:02x}{:02x}{:02x}",
        a[0], a[1], a[2], a[3], a[4], a[5]
    )
    .map_err(|_| LinkError::Io)?;
    Ok(command)
}

/// Parse `+BIND:NAP:UAP:LAP` (hex fields, leading zeros optional)
///
/// An all-zero address means nothing is bound.
fn parse_bind(line: &str) -> Option<BdAddr> {
    let rest = line.trim().strip_prefix("+BIND:")?;
    let mut parts = rest.split([':', ',']);
    let nap = u16::from_str_radix(parts.next()?, 16).ok()?;
    let uap = u8::from_str_radix(parts.next()?, 16).ok()?;
    let lap = u32::from_str_radix(parts.next()?, 16).ok()?;
    if parts.next().is_some() || lap > 0xFF_FFFF {
        return None;
    }
    if nap == 0 && uap == 0 && lap == 0 {
        return None;
    }
    let [n0, n1] = nap.to_be_bytes();
    let [_, l0, l1, l2] = lap.to_be_bytes();
    Some(BdAddr([n0, n1, uap, l0, l1, l2]))
}

impl<U, KEY, STATE, D> PeerLink for Hc05<U, KEY, STATE, D>
where
    U: Read + Write + ReadReady,
    KEY: OutputPin,
    STATE: InputPin + Wait,
    D: DelayNs,
{
    type Transport = Hc05Transport<U, STATE>;

    async fn find_service(
        &mut self,
        service: &ServiceUuid,
    ) -> Result<Option<PeerEndpoint>, LinkError> {
        if self.is_busy() {
            return Err(LinkError::Busy);
        }
        debug!("Resolving {:?} to the bound peer", service);
        self.set_command_mode(true).await?;
        let reply = self
            .command("AT+BIND?", self.config.command_timeout_ms)
            .await;
        self.set_command_mode(false).await?;

        let endpoint = reply?
            .as_deref()
            .and_then(parse_bind)
            .map(|address| PeerEndpoint {
                address,
                channel: self.config.channel,
            });
        Ok(endpoint)
    }

    async fn connect(&mut self, endpoint: &PeerEndpoint) -> Result<Self::Transport, LinkError> {
        if self.is_busy() {
            return Err(LinkError::Busy);
        }
        self.set_command_mode(true).await?;
        let linked = self.link(&endpoint.address).await;
        self.set_command_mode(false).await?;
        linked?;

        info!("HC-05 linked to {:?}", endpoint.address);
        self.port.take().ok_or(LinkError::Busy)
    }

    async fn accept(&mut self, _service: &ServiceUuid) -> Result<Self::Transport, LinkError> {
        if self.is_busy() {
            return Err(LinkError::Busy);
        }
        self.set_command_mode(false).await?;
        let port = self.port.as_mut().ok_or(LinkError::Busy)?;
        port.state_pin
            .wait_for_high()
            .await
            .map_err(|_| LinkError::Io)?;
        info!("HC-05 peer connected");
        self.port.take().ok_or(LinkError::Busy)
    }

    async fn release(&mut self, mut transport: Self::Transport) {
        let connected = transport.is_connected();
        self.port = Some(transport);
        if !connected {
            return;
        }
        if self.set_command_mode(true).await.is_ok() {
            if let Err(e) = self.command("AT+DISC", self.config.command_timeout_ms).await {
                warn!("HC-05 disconnect failed: {:?}", e);
            }
        }
        if let Err(e) = self.set_command_mode(false).await {
            warn!("HC-05 data mode not restored: {:?}", e);
        }
    }
}
