#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use stm32l4xx_hal as _; // interrupt vectors

// Same panicking *behavior* as `panic-probe` but doesn't print a panic message.
// This prevents the panic message being printed *twice* when `defmt::panic` is invoked.
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

/// Terminates the application and makes `probe-rs` exit with exit-code = 0
pub fn exit() -> ! {
    loop {
        cortex_m::asm::bkpt();
    }
}
