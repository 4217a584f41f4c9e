pub use avr_device::atmega328p::{self as mcu, Peripherals};
pub use avr_device::interrupt;

use crate::mutex::IrqCtx;

/// CPU clock.
pub const FCPU: u32 = 8_000_000;

macro_rules! define_isr {
    ($name:ident, $handler:path) => {
        #[avr_device::interrupt(atmega328p)]
        fn $name() {
            // SAFETY: We are inside of an interrupt handler.
            // Therefore, it is safe to construct an `IrqCtx`.
            let c = unsafe { IrqCtx::new() };
            $handler(&c);
        }
    };
}

define_isr!(TIMER0_COMPA, crate::timer::irq_handler_timer0_compa);
define_isr!(PCINT0, crate::controls::irq_handler_pcint0);
define_isr!(PCINT2, crate::controls::irq_handler_pcint2);
define_isr!(INT0, crate::controls::irq_handler_int0);
define_isr!(INT1, crate::controls::irq_handler_int1);
define_isr!(ADC, crate::analog::irq_handler_adc);
define_isr!(SPI_STC, crate::display::irq_handler_spi_stc);
#[cfg(feature = "debug")]
define_isr!(USART_TX, crate::debug::irq_handler_usart_tx);

// vim: ts=4 sw=4 expandtab
