#![no_main]
use embedded_hal_fuzz::{i2c::I2cFuzz, shared_data::FuzzData};
use libfuzzer_sys::fuzz_target;
use ms5803_05ba::{Address, Config, OverSamplingRatio};

type Error = ();

const RATIOS: [OverSamplingRatio; 5] = [
    OverSamplingRatio::R256,
    OverSamplingRatio::R512,
    OverSamplingRatio::R1024,
    OverSamplingRatio::R2048,
    OverSamplingRatio::R4096,
];

fuzz_target!(|data: &[u8]| {
    // The first byte picks the configuration, the rest is served over the bus.
    let (selector, bus) = match data.split_first() {
        Some((selector, bus)) => (*selector, bus),
        None => return,
    };
    let address = if selector & 0x01 == 0 {
        Address::CsbHigh
    } else {
        Address::CsbLow
    };
    let config = Config::default()
        .address(address)
        .resolution(RATIOS[usize::from(selector >> 1) % RATIOS.len()])
        .verbose(selector & 0x80 != 0);

    let i2c: I2cFuzz<'_, Error> = I2cFuzz::new(FuzzData::new(bus));
    let pressure_sensor =
        ms5803_05ba::with_config(i2c, ms5803_05ba::mock_utils::SleepNop, config);
    // Only crashes matter here. A passing PROM must keep the configuration.
    if let Ok(pressure_sensor) = pressure_sensor.init() {
        assert_eq!(pressure_sensor.config(), config);
    }
});
