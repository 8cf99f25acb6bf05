//! Factory calibration data held in the sensor PROM.
//!
//! The PROM holds eight 16 bit words. Word 0 is factory data, words 1 to 6
//! are the calibration coefficients C1 to C6 and the low nibble of word 7 is
//! a CRC-4 over the whole set.

use core::fmt;

/// Number of 16 bit words stored in the PROM.
pub const PROM_WORDS: usize = 8;

/// Index of the word carrying the CRC in its low nibble.
const CRC_WORD: usize = PROM_WORDS - 1;

/// Generates a 4bit cyclic redundancy check as described in application note
/// AN520.
///
/// The low byte of the last word is treated as zero while the remainder is
/// computed. The input is left untouched, so calling this twice on the same
/// words always gives the same result.
///
/// The 4bit crc is stored in the 4 LSBs of the result.
///
/// ```
/// let prom = [0x4000, 0xB5D2, 0xA75D, 0x7437, 0x7311, 0x7FE9, 0x7183, 0x0002];
/// assert_eq!(ms5803_05ba::crc4(&prom), 0x2);
/// ```
pub fn crc4(prom: &[u16; PROM_WORDS]) -> u8 {
    let mut words = *prom;
    words[CRC_WORD] &= 0xFF00;

    let mut n_remainder: u16 = 0;
    for byte in words.iter().flat_map(|word| word.to_be_bytes()) {
        n_remainder ^= byte as u16;
        for _ in 0..8 {
            if n_remainder & 0x8000 != 0 {
                n_remainder = (n_remainder << 1) ^ 0x3000;
            } else {
                n_remainder <<= 1;
            }
        }
    }
    ((n_remainder >> 12) & 0x000F) as u8
}

/// The CRC stored in the PROM does not match the one computed over its
/// contents. None of the coefficients can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CrcMismatch {
    /// CRC embedded in the PROM.
    pub expected: u8,
    /// CRC computed over the PROM contents.
    pub got: u8,
}

impl fmt::Display for CrcMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PROM crc mismatch: expected {:#x}, got {:#x}",
            self.expected, self.got
        )
    }
}

/// The factory calibration data as fetched from the PROM.
///
/// A value of this type only exists once its CRC has been checked, so it can
/// be handed to [`convert`](crate::convert) without further validation. It is
/// `Copy` so an application can stash it across a low power cycle and hand it
/// back through [`Uninitialised::resume`](crate::Uninitialised::resume).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationCoefficients {
    words: [u16; PROM_WORDS],
}

impl CalibrationCoefficients {
    /// Validates the raw PROM words and wraps them.
    ///
    /// # Errors
    /// Returns [`CrcMismatch`] when the CRC in the low nibble of word 7 does
    /// not match the CRC computed over all eight words.
    pub fn from_prom(words: [u16; PROM_WORDS]) -> Result<Self, CrcMismatch> {
        let expected = embedded_crc(&words);
        let got = crc4(&words);
        if expected != got {
            return Err(CrcMismatch { expected, got });
        }
        Ok(Self { words })
    }

    /// The raw PROM words, in address order.
    pub fn words(&self) -> &[u16; PROM_WORDS] {
        &self.words
    }

    /// C1, pressure sensitivity SENS_T1.
    pub fn pressure_sensitivity(&self) -> u16 {
        self.words[1]
    }

    /// C2, pressure offset OFF_T1.
    pub fn pressure_offset(&self) -> u16 {
        self.words[2]
    }

    /// C3, temperature coefficient of pressure sensitivity TCS.
    pub fn temperature_coefficient_of_pressure_sensitivity(&self) -> u16 {
        self.words[3]
    }

    /// C4, temperature coefficient of pressure offset TCO.
    pub fn temperature_coefficient_of_pressure_offset(&self) -> u16 {
        self.words[4]
    }

    /// C5, reference temperature T_REF.
    pub fn reference_temperature(&self) -> u16 {
        self.words[5]
    }

    /// C6, temperature coefficient of the temperature TEMPSENS.
    pub fn temperature_coefficient_of_temperature(&self) -> u16 {
        self.words[6]
    }

    /// The CRC embedded in the PROM.
    pub fn crc(&self) -> u8 {
        embedded_crc(&self.words)
    }
}

/// The CRC stored in the low nibble of the last PROM word.
pub(crate) fn embedded_crc(prom: &[u16; PROM_WORDS]) -> u8 {
    (prom[CRC_WORD] & 0x000F) as u8
}

#[cfg(test)]
impl CalibrationCoefficients {
    /// Builds a coefficient set from arbitrary words, patching in a valid CRC.
    pub(crate) fn with_valid_crc(mut words: [u16; PROM_WORDS]) -> Self {
        words[CRC_WORD] = (words[CRC_WORD] & 0xFFF0) | crc4(&words) as u16;
        Self { words }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const PROM: [u16; PROM_WORDS] =
        [0x4000, 0xB5D2, 0xA75D, 0x7437, 0x7311, 0x7FE9, 0x7183, 0x0002];

    #[test]
    fn crc4_matches_c_implementation() {
        let inputs = [
            PROM,
            [0xABCD, 1, 2, 3, 4, 5, 6, 7],
            [0; PROM_WORDS],
            [0xFFFF; PROM_WORDS],
            [0x1234, 0x5678, 0x9ABC, 0xDEF0, 0x0FED, 0xCBA9, 0x8765, 0x43F1],
        ];
        for input in inputs.iter() {
            let mut c_input_buffer = *input;
            let c_impl_crc: u8;
            unsafe {
                c_impl_crc = c_implementation::crc4(c_input_buffer.as_mut_ptr());
            }
            // The C implementation clears the crc byte while it runs and puts
            // it back afterwards.
            assert_eq!(&c_input_buffer, input);
            assert_eq!(c_impl_crc, crc4(input));
        }
    }

    #[test]
    fn crc4_is_repeatable_and_leaves_input_alone() {
        let prom = PROM;
        let first = crc4(&prom);
        let second = crc4(&prom);
        assert_eq!(first, second);
        assert_eq!(first, 0x2);
        assert_eq!(prom, PROM);
    }

    #[test]
    fn crc4_ignores_the_crc_byte() {
        let mut prom = PROM;
        prom[CRC_WORD] = 0x00FF;
        assert_eq!(crc4(&prom), crc4(&PROM));
    }

    #[test]
    fn crc4_known_vectors() {
        assert_eq!(crc4(&[0xABCD, 1, 2, 3, 4, 5, 6, 7]), 0x4);
        assert_eq!(crc4(&[0; PROM_WORDS]), 0x0);
    }

    #[test]
    fn embedded_crc_is_the_low_nibble() {
        assert_eq!(embedded_crc(&PROM), 0x2);
        let mut prom = PROM;
        prom[CRC_WORD] = 0xABCD;
        assert_eq!(embedded_crc(&prom), 0xD);
    }

    #[test]
    fn from_prom_accepts_valid_crc() {
        let coefficients = CalibrationCoefficients::from_prom(PROM).unwrap();
        assert_eq!(coefficients.words(), &PROM);
        assert_eq!(coefficients.pressure_sensitivity(), 46546);
        assert_eq!(coefficients.pressure_offset(), 42845);
        assert_eq!(
            coefficients.temperature_coefficient_of_pressure_sensitivity(),
            29751
        );
        assert_eq!(
            coefficients.temperature_coefficient_of_pressure_offset(),
            29457
        );
        assert_eq!(coefficients.reference_temperature(), 32745);
        assert_eq!(coefficients.temperature_coefficient_of_temperature(), 29059);
        assert_eq!(coefficients.crc(), 0x2);
    }

    #[test]
    fn from_prom_rejects_corrupted_crc() {
        let mut prom = PROM;
        prom[CRC_WORD] ^= 0x0001;
        assert_eq!(
            CalibrationCoefficients::from_prom(prom),
            Err(CrcMismatch {
                expected: 0x3,
                got: 0x2
            })
        );
    }

    #[test]
    fn from_prom_rejects_corrupted_coefficient() {
        let mut prom = PROM;
        prom[3] ^= 0x0100;
        let err = CalibrationCoefficients::from_prom(prom).unwrap_err();
        assert_eq!(err.expected, 0x2);
        assert_ne!(err.got, err.expected);
    }

    #[test]
    fn with_valid_crc_round_trips_through_from_prom() {
        let coefficients = CalibrationCoefficients::with_valid_crc([0xFFFF; PROM_WORDS]);
        assert_eq!(
            CalibrationCoefficients::from_prom(*coefficients.words()),
            Ok(coefficients)
        );
    }
}
