#![no_main]
use embedded_hal_fuzz::{i2c::I2cFuzz, shared_data::FuzzData};
use libfuzzer_sys::fuzz_target;
use ms5803_05ba::{Config, OverSamplingRatio};

type Error = ();

fuzz_target!(|data: &[u8]| {
    let data = FuzzData::new(data);
    let i2c: I2cFuzz<'_, Error> = I2cFuzz::new(data);
    let config = Config::default().resolution(OverSamplingRatio::R4096);
    let pressure_sensor =
        ms5803_05ba::with_config(i2c, ms5803_05ba::mock_utils::SleepNop, config);
    if let Ok(mut pressure_sensor) = pressure_sensor.init() {
        // The PROM passed its crc, so any raw code the bus hands back has to
        // go through the compensation without overflowing.
        for _ in 0..4 {
            let _ = pressure_sensor.read_sample();
        }
    }
});
