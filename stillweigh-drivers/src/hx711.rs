//! HX711 24-bit load-cell ADC
//!
//! Two-wire bit-banged interface: DOUT falls when a conversion is ready,
//! then 24 clock pulses shift the two's-complement result out MSB first.
//! One to three extra pulses select gain and channel for the *next*
//! conversion.
//!
//! Holding PD_SCK high for more than 60 µs powers the chip down; pulling it
//! low again wakes it, which also resets it to channel A / gain 128.

use embassy_futures::select::{select, Either};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use stillweigh_core::traits::{LoadCell, SensorError};

const POWER_MODE_CHANGE_DELAY_US: u32 = 60;
const CLK_HALF_PERIOD_US: u32 = 1;
const VALID_DATA_BITS: usize = 24;

/// Output codes the chip clamps to when the input is out of range
const SATURATED_HIGH: u32 = 0x7F_FFFF;
const SATURATED_LOW: u32 = 0x80_0000;

/// Channel/gain selected by the number of trailing clock pulses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gain {
    #[default]
    Gain128,
    Gain64,
    Gain32ChannelB,
}

impl Gain {
    fn tick_count(self) -> usize {
        match self {
            Gain::Gain128 => 25,
            Gain::Gain64 => 27,
            Gain::Gain32ChannelB => 26,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hx711Config {
    pub gain: Gain,
    /// Conversions averaged into one raw sample
    pub readings_per_sample: u8,
    /// Longest wait for DOUT to signal a finished conversion
    pub ready_timeout_ms: u32,
}

impl Default for Hx711Config {
    fn default() -> Self {
        Self {
            gain: Gain::Gain128,
            readings_per_sample: 5,
            // 10 SPS mode needs ~100 ms per conversion, ~400 ms after wake-up
            ready_timeout_ms: 500,
        }
    }
}

pub struct Hx711<CLK, DATA, D> {
    clock_pin: CLK,
    data_pin: DATA,
    delay: D,
    config: Hx711Config,
    powered_up: bool,
}

impl<CLK, DATA, D> Hx711<CLK, DATA, D>
where
    CLK: OutputPin,
    DATA: InputPin + Wait,
    D: DelayNs,
{
    pub fn new(clock_pin: CLK, data_pin: DATA, delay: D, config: Hx711Config) -> Self {
        Self {
            clock_pin,
            data_pin,
            delay,
            config,
            powered_up: false,
        }
    }

    pub fn config(&self) -> &Hx711Config {
        &self.config
    }

    pub fn is_powered_up(&self) -> bool {
        self.powered_up
    }

    pub fn release(self) -> (CLK, DATA, D) {
        (self.clock_pin, self.data_pin, self.delay)
    }

    async fn wait_ready(&mut self) -> Result<(), SensorError> {
        let timeout = self.config.ready_timeout_ms;
        match select(self.data_pin.wait_for_low(), self.delay.delay_ms(timeout)).await {
            Either::First(result) => result.map_err(|_| SensorError::Pin),
            Either::Second(()) => Err(SensorError::Timeout),
        }
    }

    /// One conversion as a sign-extended 24-bit count
    async fn read_conversion(&mut self) -> Result<i32, SensorError> {
        if !self.powered_up {
            self.power_up().await?;
        }
        self.wait_ready().await?;

        let mut data: u32 = 0;
        for tick in 0..self.config.gain.tick_count() {
            self.clock_pin.set_high().map_err(|_| SensorError::Pin)?;
            self.delay.delay_us(CLK_HALF_PERIOD_US).await;
            self.clock_pin.set_low().map_err(|_| SensorError::Pin)?;
            if tick < VALID_DATA_BITS {
                data <<= 1;
                if self.data_pin.is_high().map_err(|_| SensorError::Pin)? {
                    data |= 1;
                }
            }
            self.delay.delay_us(CLK_HALF_PERIOD_US).await;
        }

        decode(data)
    }
}

fn decode(data: u32) -> Result<i32, SensorError> {
    let data = data & ((1 << VALID_DATA_BITS) - 1);
    if data == SATURATED_HIGH || data == SATURATED_LOW {
        return Err(SensorError::Saturated);
    }
    Ok(((data << 8) as i32) >> 8)
}

impl<CLK, DATA, D> LoadCell for Hx711<CLK, DATA, D>
where
    CLK: OutputPin,
    DATA: InputPin + Wait,
    D: DelayNs,
{
    async fn init(&mut self) -> Result<(), SensorError> {
        self.reset().await?;
        // Gain pulses only apply to the following conversion
        self.read_conversion().await?;
        info!("HX711 ready, gain {:?}", self.config.gain);
        Ok(())
    }

    async fn read_raw(&mut self) -> Result<f64, SensorError> {
        let count = self.config.readings_per_sample.max(1);
        let mut sum = 0.0f64;
        for _ in 0..count {
            sum += self.read_conversion().await? as f64;
        }
        Ok(sum / count as f64)
    }

    async fn power_up(&mut self) -> Result<(), SensorError> {
        self.clock_pin.set_low().map_err(|_| SensorError::Pin)?;
        self.delay.delay_us(POWER_MODE_CHANGE_DELAY_US).await;
        self.powered_up = true;
        Ok(())
    }

    async fn power_down(&mut self) -> Result<(), SensorError> {
        self.clock_pin.set_low().map_err(|_| SensorError::Pin)?;
        self.clock_pin.set_high().map_err(|_| SensorError::Pin)?;
        self.delay.delay_us(POWER_MODE_CHANGE_DELAY_US).await;
        self.powered_up = false;
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), SensorError> {
        debug!("HX711 reset");
        self.power_down().await?;
        self.power_up().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CountingDelay, MockInputPin, MockOutputPin};
    use embassy_futures::block_on;

    fn driver(
        data: MockInputPin,
        readings_per_sample: u8,
    ) -> (Hx711<MockOutputPin, MockInputPin, CountingDelay>, MockOutputPin) {
        let clk = MockOutputPin::new();
        let config = Hx711Config {
            readings_per_sample,
            ..Hx711Config::default()
        };
        (
            Hx711::new(clk.clone(), data, CountingDelay::default(), config),
            clk,
        )
    }

    #[test]
    fn test_decode_sign_extension() {
        assert_eq!(decode(0x00_0001), Ok(1));
        assert_eq!(decode(0xFF_FFFF), Ok(-1));
        assert_eq!(decode(0x7F_FFFE), Ok(8_388_606));
        assert_eq!(decode(0x80_0001), Ok(-8_388_607));
    }

    #[test]
    fn test_decode_saturation() {
        assert_eq!(decode(SATURATED_HIGH), Err(SensorError::Saturated));
        assert_eq!(decode(SATURATED_LOW), Err(SensorError::Saturated));
    }

    #[test]
    fn test_gain_tick_counts() {
        let data = MockInputPin::with_words(&[0x00_0010]);
        let (mut hx, clk) = driver(data, 1);
        hx.config.gain = Gain::Gain64;
        block_on(hx.read_raw()).unwrap();
        assert_eq!(clk.rising_edges(), 27);
    }

    #[test]
    fn test_read_raw_averages_conversions() {
        let words = [100, 200, 300, 400, 500];
        let data = MockInputPin::with_words(&words);
        let (mut hx, clk) = driver(data, 5);

        let raw = block_on(hx.read_raw()).unwrap();
        assert_eq!(raw, 300.0);
        assert_eq!(clk.rising_edges(), 5 * 25);
        assert!(hx.is_powered_up());
    }

    #[test]
    fn test_read_negative_value() {
        let data = MockInputPin::with_words(&[0xFF_FF9C]);
        let (mut hx, _) = driver(data, 1);
        assert_eq!(block_on(hx.read_raw()), Ok(-100.0));
    }

    #[test]
    fn test_saturated_reading_is_an_error() {
        let data = MockInputPin::with_words(&[10, SATURATED_HIGH]);
        let (mut hx, _) = driver(data, 2);
        assert_eq!(block_on(hx.read_raw()), Err(SensorError::Saturated));
    }

    #[test]
    fn test_ready_timeout() {
        let data = MockInputPin::resting(true);
        let (mut hx, clk) = driver(data, 1);
        assert_eq!(block_on(hx.read_raw()), Err(SensorError::Timeout));
        // powered up, but no data clocked
        assert_eq!(clk.levels(), vec![false]);
    }

    #[test]
    fn test_power_down_and_up() {
        let (mut hx, clk) = driver(MockInputPin::resting(false), 1);
        block_on(hx.power_down()).unwrap();
        assert_eq!(clk.last(), Some(true));
        assert!(!hx.is_powered_up());
        assert!(hx.delay.elapsed_us() >= 60);

        block_on(hx.power_up()).unwrap();
        assert_eq!(clk.last(), Some(false));
        assert!(hx.is_powered_up());
    }

    #[test]
    fn test_init_resets_and_latches_gain() {
        let data = MockInputPin::with_words(&[42]);
        let (mut hx, clk) = driver(data, 1);
        block_on(hx.init()).unwrap();

        let levels = clk.levels();
        // power down (low, high), power up (low), then 25 pulses
        assert_eq!(&levels[..3], &[false, true, false]);
        assert_eq!(clk.rising_edges(), 1 + 25);
        assert!(hx.is_powered_up());
    }
}
