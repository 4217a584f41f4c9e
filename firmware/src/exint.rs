#![allow(unused_unsafe)]

use crate::{
    hw::mcu,
    mutex::{LazyMainInit, MainInitCtx},
    ports::{PB_ENC_V_A, PB_ENC_V_B, PD_ENC_I_A, PD_ENC_I_B, PD_TOP_BTN},
};

#[allow(non_snake_case)]
pub struct ExInt {
    pub EXINT: mcu::EXINT,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static EXINT: LazyMainInit<ExInt> = unsafe { LazyMainInit::uninit() };

/// PCINT0..7 are port B.
const PCMSK0: u8 = (1 << PB_ENC_V_B) | (1 << PB_ENC_V_A);
/// PCINT16..23 are port D.
const PCMSK2: u8 = (1 << PD_TOP_BTN) | (1 << PD_ENC_I_B) | (1 << PD_ENC_I_A);

const PCIE0: u8 = 1 << 0;
const PCIE2: u8 = 1 << 2;

/// INT0 and INT1 on the falling edge.
const EICRA: u8 = (0b10 << 0) | (0b10 << 2);
const INT0: u8 = 1 << 0;
const INT1: u8 = 1 << 1;

impl ExInt {
    #[allow(clippy::identity_op)]
    pub fn setup(&self, _: &MainInitCtx) {
        // SAFETY: Every bit pattern is valid for these registers.
        unsafe {
            self.EXINT.pcmsk0().write(|w| w.bits(PCMSK0));
            self.EXINT.pcmsk1().write(|w| w.bits(0));
            self.EXINT.pcmsk2().write(|w| w.bits(PCMSK2));
            self.EXINT.pcifr().write(|w| w.bits(PCIE0 | PCIE2));
            self.EXINT.pcicr().write(|w| w.bits(PCIE0 | PCIE2));

            self.EXINT.eicra().write(|w| w.bits(EICRA));
            self.EXINT.eifr().write(|w| w.bits(INT0 | INT1));
            self.EXINT.eimsk().write(|w| w.bits(INT0 | INT1));
        }
    }
}

// vim: ts=4 sw=4 expandtab
