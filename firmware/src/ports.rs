#![allow(unused_unsafe)]

use crate::{
    hw::mcu,
    mutex::{LazyMainInit, MainInitCtx},
};

macro_rules! impl_port {
    ($struct:ident, $name:ident, $port:ident, $pin:ident, $ddr:ident) => {
        #[allow(non_snake_case)]
        pub struct $struct {
            pub $name: mcu::$name,
        }

        // SAFETY: Is initialized when constructing the MainCtx.
        pub static $name: LazyMainInit<$struct> = unsafe { LazyMainInit::uninit() };

        impl $struct {
            /// Read the whole input register.
            #[inline(always)]
            pub fn read(&self) -> u8 {
                self.$name.$pin().read().bits()
            }

            #[inline(always)]
            pub fn set(&self, bit: u8, value: bool) {
                self.$name.$port().modify(|r, w| {
                    let bits = if value {
                        r.bits() | (1 << bit)
                    } else {
                        r.bits() & !(1 << bit)
                    };
                    // SAFETY: Every bit pattern is valid for a port register.
                    unsafe { w.bits(bits) }
                });
            }

            fn setup_bits(&self, port: u8, ddr: u8) {
                // SAFETY: Every bit pattern is valid for the port registers.
                unsafe {
                    self.$name.$port().write(|w| w.bits(port));
                    self.$name.$ddr().write(|w| w.bits(ddr));
                }
            }
        }
    };
}

impl_port!(PortB, PORTB, portb, pinb, ddrb);
impl_port!(PortC, PORTC, portc, pinc, ddrc);
impl_port!(PortD, PORTD, portd, pind, ddrd);

// Port B
pub const PB_PWM: u8 = 1;
pub const PB_SS: u8 = 2;
pub const PB_ENC_V_B: u8 = 6;
pub const PB_ENC_V_A: u8 = 7;

// Port C
pub const PC_MINILOAD: u8 = 1;
pub const PC_OUTPUT_DIS: u8 = 2;

// Port D
pub const PD_ENC_V_SW: u8 = 2;
pub const PD_ENC_I_SW: u8 = 3;
pub const PD_TOP_BTN: u8 = 4;
pub const PD_ENC_I_B: u8 = 5;
pub const PD_ENC_I_A: u8 = 6;

fn pin_input(_bit: u8) -> u8 {
    0
}
fn pin_output(bit: u8) -> u8 {
    1 << bit
}
fn pin_low(_bit: u8) -> u8 {
    0
}
fn pin_high(bit: u8) -> u8 {
    1 << bit
}
fn pin_floating(_bit: u8) -> u8 {
    0
}
fn pin_pullup(bit: u8) -> u8 {
    1 << bit
}

impl PortB {
    pub fn setup(&self, _: &MainInitCtx) {
        self.setup_bits(
            pin_low(0) | // DNC
            pin_low(PB_PWM) | // OC1A voltage PWM
            pin_high(PB_SS) | // display latch, active low
            pin_low(3) | // MOSI
            pin_pullup(4) | // MISO, unused
            pin_low(5) | // SCK
            pin_pullup(PB_ENC_V_B) |
            pin_pullup(PB_ENC_V_A),
            pin_output(0) |
            pin_output(PB_PWM) |
            pin_output(PB_SS) |
            pin_output(3) |
            pin_input(4) |
            pin_output(5) |
            pin_input(PB_ENC_V_B) |
            pin_input(PB_ENC_V_A),
        );
    }
}

impl PortC {
    pub fn setup(&self, _: &MainInitCtx) {
        self.setup_bits(
            pin_low(0) | // DNC
            pin_low(PC_MINILOAD) |
            pin_low(PC_OUTPUT_DIS) | // output enabled
            pin_floating(3) | // current sense, ADC3
            pin_low(4) | // DNC
            pin_low(5) | // DNC
            pin_floating(6), // RESET
            pin_output(0) |
            pin_output(PC_MINILOAD) |
            pin_output(PC_OUTPUT_DIS) |
            pin_input(3) |
            pin_output(4) |
            pin_output(5) |
            pin_input(6),
        );
    }
}

impl PortD {
    pub fn setup(&self, _: &MainInitCtx) {
        self.setup_bits(
            pin_pullup(0) | // RXD
            pin_high(1) | // TXD
            pin_pullup(PD_ENC_V_SW) |
            pin_pullup(PD_ENC_I_SW) |
            pin_pullup(PD_TOP_BTN) |
            pin_pullup(PD_ENC_I_B) |
            pin_pullup(PD_ENC_I_A) |
            pin_low(7), // DNC
            pin_input(0) |
            pin_output(1) |
            pin_input(PD_ENC_V_SW) |
            pin_input(PD_ENC_I_SW) |
            pin_input(PD_TOP_BTN) |
            pin_input(PD_ENC_I_B) |
            pin_input(PD_ENC_I_A) |
            pin_output(7),
        );
    }
}

// vim: ts=4 sw=4 expandtab
