//! First and second order temperature compensation for the 5 bar part.
//!
//! Everything here is integer math with truncating division. The widths of
//! the intermediates follow the datasheet so results match the calibrated
//! device bit for bit; floats only appear in [`Reading::celsius`] and
//! [`Reading::millibar`].

use crate::prom::CalibrationCoefficients;

const POW2_5: i64 = 1 << 5;
const POW2_7: i64 = 1 << 7;
const POW2_15: i64 = 1 << 15;
const POW2_17: i64 = 1 << 17;
const POW2_18: i64 = 1 << 18;
const POW2_21: i64 = 1 << 21;
const POW2_23: i64 = 1 << 23;
const POW2_33: i64 = 1 << 33;

/// The ADC produces 24 bit codes.
const ADC_MASK: u32 = 0x00FF_FFFF;

/// 20.00 °C, the reference temperature of the first order model.
const REFERENCE_TEMPERATURE: i32 = 2000;

/// -15.00 °C, below which the very low temperature correction applies.
#[cfg(feature = "very-low-temperature")]
const VERY_LOW_TEMPERATURE: i32 = -1500;

/// A compensated temperature and pressure pair. These are grouped as pressure
/// compensation requires the current temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// Temperature in hundredths of a degree Celsius.
    pub temperature: i32,
    /// Pressure in hundredths of a millibar.
    pub pressure: i32,
}

impl Reading {
    /// Temperature in degrees Celsius.
    pub fn celsius(&self) -> f32 {
        self.temperature as f32 / 100.0
    }

    /// Pressure in millibar.
    pub fn millibar(&self) -> f32 {
        self.pressure as f32 / 100.0
    }
}

/// Second order correction terms, all zero at or above 20 °C.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SecondOrder {
    pub(crate) t2: i32,
    pub(crate) off2: i64,
    pub(crate) sens2: i64,
}

pub(crate) fn second_order(dt: i32, temperature: i32) -> SecondOrder {
    if temperature >= REFERENCE_TEMPERATURE {
        return SecondOrder::default();
    }

    let dt = i64::from(dt);
    let below_reference = i64::from(temperature - REFERENCE_TEMPERATURE);

    // T2 = 3 * dT^2 / 2^33
    let t2 = (3 * dt * dt / POW2_33) as i32;
    // OFF2 = 3 * (TEMP - 2000)^2 / 8
    let off2 = 3 * below_reference * below_reference / 8;
    // SENS2 = 7 * (TEMP - 2000)^2 / 8
    #[allow(unused_mut)]
    let mut sens2 = 7 * below_reference * below_reference / 8;

    // Only SENS2 moves, OFF2 is left alone.
    #[cfg(feature = "very-low-temperature")]
    if temperature < VERY_LOW_TEMPERATURE {
        let below = i64::from(temperature - VERY_LOW_TEMPERATURE);
        sens2 += 3 * below * below;
    }

    SecondOrder { t2, off2, sens2 }
}

/// Converts raw pressure (`d1`) and temperature (`d2`) ADC codes into a
/// compensated [`Reading`].
///
/// Only the low 24 bits of each code are used, which is all the ADC produces.
///
/// ```
/// use ms5803_05ba::{convert, CalibrationCoefficients};
///
/// let prom = [0x4000, 0xB5D2, 0xA75D, 0x7437, 0x7311, 0x7FE9, 0x7183, 0x0002];
/// let coefficients = CalibrationCoefficients::from_prom(prom).unwrap();
/// let reading = convert(5_000_000, 8_387_300, &coefficients);
/// assert_eq!(reading.temperature, 2015);
/// assert_eq!(reading.pressure, 101086);
/// ```
pub fn convert(d1: u32, d2: u32, coefficients: &CalibrationCoefficients) -> Reading {
    let adc_pressure = i64::from(d1 & ADC_MASK);
    let adc_temperature = (d2 & ADC_MASK) as i32;
    let sens_t1 = i64::from(coefficients.pressure_sensitivity());
    let off_t1 = i64::from(coefficients.pressure_offset());
    let tcs = i64::from(coefficients.temperature_coefficient_of_pressure_sensitivity());
    let tco = i64::from(coefficients.temperature_coefficient_of_pressure_offset());
    let t_ref = i32::from(coefficients.reference_temperature());
    let temp_sens = i64::from(coefficients.temperature_coefficient_of_temperature());

    // dT = D2 - T_REF * 2^8
    let dt = adc_temperature - t_ref * 256;

    // TEMP = 2000 + dT * TEMPSENS / 2^23
    let temperature =
        (i64::from(REFERENCE_TEMPERATURE) + i64::from(dt) * temp_sens / POW2_23) as i32;

    let correction = second_order(dt, temperature);

    let dt = i64::from(dt);
    // OFF = OFF_T1 * 2^18 + TCO * dT / 2^5
    let offset = off_t1 * POW2_18 + tco * dt / POW2_5 - correction.off2;
    // SENS = SENS_T1 * 2^17 + TCS * dT / 2^7
    let sensitivity = sens_t1 * POW2_17 + tcs * dt / POW2_7 - correction.sens2;

    let temperature = temperature - correction.t2;
    // P = (D1 * SENS / 2^21 - OFF) / 2^15
    let pressure = ((adc_pressure * sensitivity / POW2_21 - offset) / POW2_15) as i32;

    Reading {
        temperature,
        pressure,
    }
}
