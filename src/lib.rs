//! # Getting started
//!
//! A platform agnostic driver for the [MS5803-05BA](https://www.te.com/usa-en/product-CAT-BLPS0011.html)
//! pressure sensor from TE Connectivity (Measurement Specialties).
//!
//! This driver supports reading the temperature/pressure from the on-chip ADC
//! over i2c. Only the 5 bar part is supported, the other MS5803 ranges use
//! different compensation constants and will give wrong readings.
//!
//! ## Example
//! ```rust
//! # // NOTE: Use real i2c instance for your app.
//! # use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
//! # let i2c = I2cMock::new(&[I2cTransaction::write(0x76, vec![0x1E]),
//! #     I2cTransaction::write_read(0x76, vec![0xA0], vec![0x40, 0x00]),
//! #     I2cTransaction::write_read(0x76, vec![0xA2], vec![0xB5, 0xD2]),
//! #     I2cTransaction::write_read(0x76, vec![0xA4], vec![0xA7, 0x5D]),
//! #     I2cTransaction::write_read(0x76, vec![0xA6], vec![0x74, 0x37]),
//! #     I2cTransaction::write_read(0x76, vec![0xA8], vec![0x73, 0x11]),
//! #     I2cTransaction::write_read(0x76, vec![0xAA], vec![0x7F, 0xE9]),
//! #     I2cTransaction::write_read(0x76, vec![0xAC], vec![0x71, 0x83]),
//! #     I2cTransaction::write_read(0x76, vec![0xAE], vec![0x00, 0x02]),
//! #     I2cTransaction::write(0x76, vec![0b0100_0010]),
//! #     I2cTransaction::write_read(0x76, vec![0x00], vec![0x4C, 0x4B, 0x40]),
//! #     I2cTransaction::write(0x76, vec![0b0101_0010]),
//! #     I2cTransaction::write_read(0x76, vec![0x00], vec![0x7F, 0xFA, 0xE4]),
//! # ]);
//! use ms5803_05ba::mock_utils::SleepNop;
//! // NOTE: You should implement the DelayUs trait for this driver to work
//! // correctly.
//! let pressure_sensor = ms5803_05ba::new(i2c, SleepNop);
//! let mut pressure_sensor = pressure_sensor.init().unwrap();
//! let reading = pressure_sensor.read_sample().unwrap();
//! println!("{} deg C, {} mbar", reading.celsius(), reading.millibar());
//! assert_eq!(pressure_sensor.temperature(), Some(20.15));
//! assert_eq!(pressure_sensor.pressure(), Some(1010.86));
//! ```
//!
//! ## Features
//!
//! - `defmt`: log through `defmt` and derive `defmt::Format` on public types.
//! - `log`: log through the `log` facade. Mutually exclusive with `defmt`.
//! - `very-low-temperature`: apply the extra sensitivity correction below
//!   -15 °C. It is documented for this part but disabled by default.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("Features \"defmt\" and \"log\" are mutually exclusive and cannot be enabled together");

// This must go first so the logging macros are visible to the other modules.
mod fmt;

mod compensation;
mod prom;

use embedded_hal::blocking::{
    delay::DelayUs,
    i2c::{Write, WriteRead},
};

pub use compensation::{convert, Reading};
pub use prom::{crc4, CalibrationCoefficients, CrcMismatch, PROM_WORDS};
use prom::embedded_crc;

/// Mock utils is a set of tools to aid in testing and documenting you should not
/// use any of the mocks defined in this module in your release binaries.
pub mod mock_utils {
    /// A sleep implementation that does nothing and immediately exists. This is
    /// useful for testing and fuzzing.
    pub struct SleepNop;

    impl embedded_hal::blocking::delay::DelayUs<u32> for SleepNop {
        fn delay_us(&mut self, _us: u32) {
            // Nop
        }
    }
}

/// A catch all error for this driver
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError<E> {
    /// The PROM contents failed their CRC check. Check the wiring and retry
    /// initialisation; no reading can be trusted until it passes.
    PromCrcMismatch { got: u8, expected: u8 },
    /// The i2c transport reported an error.
    I2cError(E),
}

impl<E> From<CrcMismatch> for SensorError<E> {
    fn from(err: CrcMismatch) -> Self {
        SensorError::PromCrcMismatch {
            got: err.got,
            expected: err.expected,
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for SensorError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SensorError::PromCrcMismatch { got, expected } => write!(
                f,
                "PROM crc mismatch: expected {:#x}, got {:#x}",
                expected, got
            ),
            SensorError::I2cError(e) => write!(f, "i2c error: {:?}", e),
        }
    }
}

type SensorResult<T, I2C> = Result<T, SensorError<<I2C as WriteRead>::Error>>;

/// Settling time after a reset while the PROM is reloaded.
const RESET_TIME_US: u32 = 5_000;

pub trait I2cMarker: WriteRead + Write
where
    Self: Write<Error = <Self as WriteRead>::Error>,
{
}
impl<T: WriteRead + Write> I2cMarker for T where Self: Write<Error = <Self as WriteRead>::Error> {}

/// Create an uninitialised driver object with the default [`Config`].
///
/// # Example
///
/// ```
/// // NOTE: Use real i2c instance for your app.
/// use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
/// use ms5803_05ba::mock_utils::SleepNop;
/// // NOTE: You should implement the DelayUs trait for this driver to work
/// // correctly.
/// let i2c = I2cMock::new(&[]);
/// let pressure_sensor = ms5803_05ba::new(i2c, SleepNop);
/// ```
pub fn new<I2C: I2cMarker, D: DelayUs<u32>>(i2c: I2C, delay: D) -> Uninitialised<I2C, D> {
    with_config(i2c, delay, Config::default())
}

/// Create an uninitialised driver object.
///
/// # Example
///
/// ```
/// use embedded_hal_mock::i2c::Mock as I2cMock;
/// use ms5803_05ba::{mock_utils::SleepNop, Address, Config, OverSamplingRatio};
/// let i2c = I2cMock::new(&[]);
/// let config = Config::default()
///     .address(Address::CsbLow)
///     .resolution(OverSamplingRatio::R4096);
/// let pressure_sensor = ms5803_05ba::with_config(i2c, SleepNop, config);
/// ```
pub fn with_config<I2C: I2cMarker, D: DelayUs<u32>>(
    i2c: I2C,
    delay: D,
    config: Config,
) -> Uninitialised<I2C, D> {
    Uninitialised { i2c, delay, config }
}

/// The oversampling ratio to use internal to the ADC. This is analogous to taking
/// n samples and then taking the average. Higher ratios give a finer
/// resolution (1, 0.6, 0.4, 0.3 and 0.2 mbar) at the cost of a longer
/// conversion.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverSamplingRatio {
    R256 = 0x0,
    R512 = 0x2,
    R1024 = 0x4,
    R2048 = 0x6,
    R4096 = 0x8,
}

impl OverSamplingRatio {
    /// Time to wait between starting a conversion and reading the ADC.
    fn conversion_time_us(&self) -> u32 {
        use OverSamplingRatio::*;
        match *self {
            R256 => 1_000,
            R512 => 3_000,
            R1024 => 4_000,
            R2048 => 6_000,
            R4096 => 10_000,
        }
    }

    /// The number of samples averaged by the ADC.
    pub fn value(&self) -> u16 {
        use OverSamplingRatio::*;
        match *self {
            R256 => 256,
            R512 => 512,
            R1024 => 1024,
            R2048 => 2048,
            R4096 => 4096,
        }
    }
}

/// An oversampling ratio other than 256, 512, 1024, 2048 or 4096 was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidResolution(pub u16);

impl core::fmt::Display for InvalidResolution {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "invalid oversampling ratio {}, choices are 256, 512, 1024, 2048 or 4096",
            self.0
        )
    }
}

/// Maps a sample count onto an [`OverSamplingRatio`].
///
/// ```
/// use ms5803_05ba::{InvalidResolution, OverSamplingRatio};
/// assert_eq!(OverSamplingRatio::try_from(2048), Ok(OverSamplingRatio::R2048));
/// assert_eq!(OverSamplingRatio::try_from(1000), Err(InvalidResolution(1000)));
/// ```
impl TryFrom<u16> for OverSamplingRatio {
    type Error = InvalidResolution;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        use OverSamplingRatio::*;
        match value {
            256 => Ok(R256),
            512 => Ok(R512),
            1024 => Ok(R1024),
            2048 => Ok(R2048),
            4096 => Ok(R4096),
            other => {
                warn!("invalid oversampling ratio {}", other);
                Err(InvalidResolution(other))
            }
        }
    }
}

/// The 7 bit i2c address, selected by the level of the CSB pin.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Address {
    /// CSB tied high.
    CsbHigh = 0x76,
    /// CSB tied low.
    CsbLow = 0x77,
}

impl From<Address> for u8 {
    fn from(address: Address) -> u8 {
        address as u8
    }
}

/// Driver configuration, fixed once the driver is constructed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub(crate) address: Address,
    pub(crate) resolution: OverSamplingRatio,
    pub(crate) verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: Address::CsbHigh,
            resolution: OverSamplingRatio::R512,
            verbose: false,
        }
    }
}

impl Config {
    pub fn address(mut self, address: Address) -> Self {
        self.address = address;

        self
    }

    /// Oversampling ratio used for both the pressure and the temperature
    /// conversion.
    pub fn resolution(mut self, resolution: OverSamplingRatio) -> Self {
        self.resolution = resolution;

        self
    }

    /// Log the oversampling ratio, every PROM word and the embedded and
    /// computed PROM crc at info level while initialising. Needs the `defmt`
    /// or `log` feature to have any visible effect.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;

        self
    }
}

/// An I2C command to send to the pressure sensor.
#[derive(Clone, Copy)]
enum Command {
    Reset,
    ConvertD1(OverSamplingRatio),
    ConvertD2(OverSamplingRatio),
    AdcRead,
    PromRead(u8),
}

/// Convert the command into a single byte that can be sent over i2c.
impl From<Command> for u8 {
    fn from(val: Command) -> u8 {
        use Command::*;
        match val {
            Reset => 0x1E,
            ConvertD1(osr) => 0x40u8 | osr as u8,
            ConvertD2(osr) => 0x50u8 | osr as u8,
            AdcRead => 0x00,
            PromRead(address) => 0xA0u8 | (address << 1),
        }
    }
}

/// Send the reset sequence and wait for the PROM to reload.
fn reset<I2C: I2cMarker, D: DelayUs<u32>>(
    i2c: &mut I2C,
    delay: &mut D,
    address: Address,
) -> SensorResult<(), I2C> {
    i2c.write(address.into(), &[Command::Reset.into()])
        .map_err(SensorError::I2cError)?;
    delay.delay_us(RESET_TIME_US);
    Ok(())
}

/// A raw pair of ADC codes, kept for diagnostics.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// Uncompensated pressure.
    pub d1: u32,
    /// Uncompensated temperature.
    pub d2: u32,
}

/// An uninitialised ms5803 object.
pub struct Uninitialised<I2C: I2cMarker, D: DelayUs<u32>> {
    i2c: I2C,
    delay: D,
    config: Config,
}

impl<I2C: I2cMarker, D: DelayUs<u32>> Uninitialised<I2C, D> {
    /// Reset the ms5803 internal state machine.
    pub fn reset(&mut self) -> SensorResult<(), I2C> {
        reset(&mut self.i2c, &mut self.delay, self.config.address)
    }

    /// Read the contents of the PROM.
    fn read_prom(&mut self) -> SensorResult<[u16; PROM_WORDS], I2C> {
        let mut prom = [0u16; PROM_WORDS];
        let mut prom_address: u8 = 0;
        for entry in prom.iter_mut() {
            let mut buffer = [0, 0];
            self.i2c
                .write_read(
                    self.config.address.into(),
                    &[Command::PromRead(prom_address).into()],
                    &mut buffer,
                )
                .map_err(SensorError::I2cError)?;
            *entry = u16::from_be_bytes(buffer);
            if self.config.verbose {
                info!("C{} = {}", prom_address, *entry);
            }
            prom_address += 1;
        }
        Ok(prom)
    }

    /// Reads and validates the PROM contents.
    fn read_calibration_data(&mut self) -> SensorResult<CalibrationCoefficients, I2C> {
        let prom = self.read_prom()?;
        if self.config.verbose {
            info!(
                "PROM crc: embedded {}, computed {}",
                embedded_crc(&prom),
                crc4(&prom)
            );
        }
        let calibration_data = CalibrationCoefficients::from_prom(prom).map_err(|err| {
            warn!(
                "PROM crc mismatch: expected {}, got {}",
                err.expected, err.got
            );
            err
        })?;
        Ok(calibration_data)
    }

    /// Releases the i2c handle consuming the driver object.
    ///
    /// # Example
    ///
    /// ```
    /// // NOTE: Use real i2c instance for your app.
    /// use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    /// // Dummy sleep implementation.
    /// use ms5803_05ba::mock_utils::SleepNop;
    /// let i2c = I2cMock::new(&[]);
    /// let pressure_sensor = ms5803_05ba::new(i2c, SleepNop);
    /// let (i2c, _) = pressure_sensor.release();
    /// ```
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Initialised the pressure sensor: resets it, reads the factory
    /// calibration data and checks its CRC.
    ///
    /// # Errors
    /// Initialisation can fail if;
    /// - There was a problem communicating over i2c.
    /// - There was a crc mismatch when reading factory calibration data off the
    ///   PROM. No reading should be trusted in that case; check the wiring and
    ///   retry.
    ///
    /// NOTE: on failure the i2c handle is dropped along with the driver.
    ///
    /// # Example
    ///
    /// ```rust
    /// // NOTE: Use real i2c instance for your app.
    /// # use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    /// # let i2c = I2cMock::new(&[I2cTransaction::write(0x76, vec![0x1E]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA0], vec![0x40, 0x00]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA2], vec![0xB5, 0xD2]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA4], vec![0xA7, 0x5D]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA6], vec![0x74, 0x37]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA8], vec![0x73, 0x11]),
    /// #     I2cTransaction::write_read(0x76, vec![0xAA], vec![0x7F, 0xE9]),
    /// #     I2cTransaction::write_read(0x76, vec![0xAC], vec![0x71, 0x83]),
    /// #     I2cTransaction::write_read(0x76, vec![0xAE], vec![0x00, 0x02]),
    /// # ]);
    /// use ms5803_05ba::mock_utils::SleepNop;
    /// let pressure_sensor = ms5803_05ba::new(i2c, SleepNop);
    /// let pressure_sensor = pressure_sensor.init();
    /// assert!(pressure_sensor.is_ok());
    /// ```
    pub fn init(mut self) -> SensorResult<Initialised<I2C, D>, I2C> {
        if self.config.verbose {
            info!("Oversampling setting: {}", self.config.resolution.value());
        }
        self.reset()?;
        let calibration_data = self.read_calibration_data()?;
        debug!("ms5803 initialised");

        Ok(self.resume(calibration_data))
    }

    /// Skips the reset and PROM read, reusing calibration data validated by
    /// an earlier [`init`](Self::init). Useful when the host keeps the
    /// coefficients across a low power cycle; calling `init` again is the
    /// conservative choice.
    pub fn resume(self, calibration_data: CalibrationCoefficients) -> Initialised<I2C, D> {
        Initialised {
            i2c: self.i2c,
            delay: self.delay,
            config: self.config,
            calibration_data,
            last: None,
        }
    }
}

/// An initialised ms5803 object.
pub struct Initialised<I2C: I2cMarker, D: DelayUs<u32>> {
    i2c: I2C,
    delay: D,
    config: Config,
    calibration_data: CalibrationCoefficients,
    last: Option<(RawSample, Reading)>,
}

impl<I2C: I2cMarker, D: DelayUs<u32>> Initialised<I2C, D> {
    /// Release the i2c handle consuming the driver.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Reset the ms5803 internal state machine. The calibration data is kept.
    pub fn reset(&mut self) -> SensorResult<(), I2C> {
        reset(&mut self.i2c, &mut self.delay, self.config.address)
    }

    /// The validated factory calibration data.
    pub fn calibration(&self) -> CalibrationCoefficients {
        self.calibration_data
    }

    /// The configuration the driver was built with.
    pub fn config(&self) -> Config {
        self.config
    }

    /// The oversampling ratio used for every conversion.
    pub fn over_sampling_ratio(&self) -> OverSamplingRatio {
        self.config.resolution
    }

    /// Starts a conversion and reads the 24 bit result.
    fn read_adc(&mut self, command: Command) -> SensorResult<u32, I2C> {
        let mut buffer = [0u8; 4];
        let address = self.config.address.into();
        self.i2c
            .write(address, &[command.into()])
            .map_err(SensorError::I2cError)?;
        self.delay
            .delay_us(self.config.resolution.conversion_time_us());
        self.i2c
            .write_read(
                address,
                &[Command::AdcRead.into()],
                // ADC is 24bit but we are storing in u32.
                &mut buffer[1..],
            )
            .map_err(SensorError::I2cError)?;
        Ok(u32::from_be_bytes(buffer))
    }

    // Starts conversion and reads raw pressure from the sensor.
    fn read_raw_pressure(&mut self) -> SensorResult<u32, I2C> {
        self.read_adc(Command::ConvertD1(self.config.resolution))
    }

    // Starts conversion and reads raw temperature from the sensor.
    fn read_raw_temperature(&mut self) -> SensorResult<u32, I2C> {
        self.read_adc(Command::ConvertD2(self.config.resolution))
    }

    /// Reads the raw pressure and temperature, then compensates them.
    ///
    /// The result is also kept and can be fetched again through
    /// [`temperature`](Self::temperature), [`pressure`](Self::pressure),
    /// [`reading`](Self::reading) and [`raw_sample`](Self::raw_sample).
    ///
    /// # Errors
    /// This may return an error if there is a problem with i2c communication.
    /// The previous sample is left in place in that case.
    ///
    /// # Example
    ///
    /// ```rust
    /// # // NOTE: Use real i2c instance for your app.
    /// # use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    /// # let i2c = I2cMock::new(&[I2cTransaction::write(0x76, vec![0x1E]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA0], vec![0x40, 0x00]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA2], vec![0xB5, 0xD2]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA4], vec![0xA7, 0x5D]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA6], vec![0x74, 0x37]),
    /// #     I2cTransaction::write_read(0x76, vec![0xA8], vec![0x73, 0x11]),
    /// #     I2cTransaction::write_read(0x76, vec![0xAA], vec![0x7F, 0xE9]),
    /// #     I2cTransaction::write_read(0x76, vec![0xAC], vec![0x71, 0x83]),
    /// #     I2cTransaction::write_read(0x76, vec![0xAE], vec![0x00, 0x02]),
    /// #     I2cTransaction::write(0x76, vec![0b0100_0010]),
    /// #     I2cTransaction::write_read(0x76, vec![0x00], vec![0x4C, 0x4B, 0x40]),
    /// #     I2cTransaction::write(0x76, vec![0b0101_0010]),
    /// #     I2cTransaction::write_read(0x76, vec![0x00], vec![0x7F, 0xFA, 0xE4]),
    /// # ]);
    /// use ms5803_05ba::mock_utils::SleepNop;
    /// let pressure_sensor = ms5803_05ba::new(i2c, SleepNop);
    /// let mut pressure_sensor = pressure_sensor.init().unwrap();
    /// println!("{:?}", pressure_sensor.read_sample().unwrap());
    /// assert_eq!(pressure_sensor.d1(), Some(5_000_000));
    /// ```
    pub fn read_sample(&mut self) -> SensorResult<Reading, I2C> {
        let d1 = self.read_raw_pressure()?;
        let d2 = self.read_raw_temperature()?;
        trace!("D1 = {}, D2 = {}", d1, d2);

        let reading = convert(d1, d2, &self.calibration_data);
        self.last = Some((RawSample { d1, d2 }, reading));
        Ok(reading)
    }

    /// The most recent compensated reading.
    pub fn reading(&self) -> Option<Reading> {
        self.last.map(|(_, reading)| reading)
    }

    /// Temperature of the most recent reading in degrees Celsius.
    pub fn temperature(&self) -> Option<f32> {
        self.reading().map(|reading| reading.celsius())
    }

    /// Pressure of the most recent reading in millibar.
    pub fn pressure(&self) -> Option<f32> {
        self.reading().map(|reading| reading.millibar())
    }

    /// The raw ADC codes behind the most recent reading.
    pub fn raw_sample(&self) -> Option<RawSample> {
        self.last.map(|(raw, _)| raw)
    }

    /// Raw pressure code of the most recent reading, mostly for troubleshooting.
    pub fn d1(&self) -> Option<u32> {
        self.raw_sample().map(|raw| raw.d1)
    }

    /// Raw temperature code of the most recent reading, mostly for troubleshooting.
    pub fn d2(&self) -> Option<u32> {
        self.raw_sample().map(|raw| raw.d2)
    }
}
