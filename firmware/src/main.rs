#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]
#![feature(asm_experimental_arch)]

mod actions;
mod analog;
mod controls;
mod debug;
mod display;
mod eeprom;
mod exint;
mod history;
mod hw;
mod mutex;
mod ports;
mod supply;
mod system;
mod timer;

use crate::{
    actions::SCHED,
    exint::{EXINT, ExInt},
    hw::{Peripherals, interrupt, mcu},
    mutex::{MainCtx, MainInitCtx, unwrap_option},
    ports::{PORTB, PORTC, PORTD, PortB, PortC, PortD},
    system::System,
};

static SYSTEM: System = System::new();

fn wdt_init() {
    // SAFETY: The asm code only accesses the WDT registers
    //         which are not accessed from anywhere else in the program.
    unsafe {
        // Enable WDT with timeout 0.5 s
        core::arch::asm!(
            "ldi {tmp}, 0x18", // WDCE=1, WDE=1
            "sts {WDTCSR}, {tmp}",
            "ldi {tmp}, 0x0D", // WDE=1, WDP2=1, WDP0=1
            "sts {WDTCSR}, {tmp}",
            tmp = out(reg_upper) _,
            WDTCSR = const 0x60,
            options(nostack, preserves_flags)
        );
    }
}

fn wdt_poke(_wp: &mcu::WDT) {
    avr_device::asm::wdr();
}

#[avr_device::entry]
fn main() -> ! {
    wdt_init();

    let dp = unwrap_option(Peripherals::take());
    let wdt = dp.WDT;

    let init_static_vars = |c: &MainInitCtx| {
        PORTB.init(c, PortB { PORTB: dp.PORTB });
        PORTC.init(c, PortC { PORTC: dp.PORTC });
        PORTD.init(c, PortD { PORTD: dp.PORTD });
        EXINT.init(c, ExInt { EXINT: dp.EXINT });
        timer::DP.init(c, timer::Dp { TC0: dp.TC0 });
        supply::DP.init(c, supply::Dp { TC1: dp.TC1 });
        analog::DP.init(c, analog::Dp { ADC: dp.ADC });
        display::DP.init(c, display::Dp { SPI: dp.SPI });
        eeprom::DP.init(c, eeprom::Dp { EEPROM: dp.EEPROM });
        debug::DP.init(c, debug::Dp { USART0: dp.USART0 });

        PORTB.deref_init(c).setup(c);
        PORTC.deref_init(c).setup(c);
        PORTD.deref_init(c).setup(c);
        supply::DP.deref_init(c).setup(c);
        display::DP.deref_init(c).setup(c);
        analog::DP.deref_init(c).setup(c);
        debug::DP.deref_init(c).setup(c);
        timer::DP.deref_init(c).setup(c);
        EXINT.deref_init(c).setup(c);
    };

    // # SAFETY
    //
    // This is the context handle for the main() function.
    // Holding a reference to this object proves that the holder
    // is running in main() context.
    let m = unsafe { MainCtx::new_with_init(init_static_vars) };

    SYSTEM.init(&m);

    // SAFETY: This must be after construction of MainCtx
    //         and after initialization of static LazyMainInit variables.
    unsafe { interrupt::enable() };

    loop {
        SCHED.run_once(|action, data| SYSTEM.dispatch(&m, action, data));
        wdt_poke(&wdt);
    }
}

// vim: ts=4 sw=4 expandtab
