#![allow(unused_unsafe)]

use crate::{
    actions::SCHED,
    hw::{FCPU, mcu},
    mutex::{IrqCtx, LazyMainInit, MainInitCtx},
};
use evq::Ticks;

#[allow(non_snake_case)]
pub struct Dp {
    pub TC0: mcu::TC0,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static DP: LazyMainInit<Dp> = unsafe { LazyMainInit::uninit() };

/// Scheduler tick frequency.
pub const TICK_HZ: u32 = 1000;

const TC0_PS: u32 = 64;
const TC0_OCR: u32 = FCPU / (TC0_PS * TICK_HZ) - 1;
const _: () = assert!(TC0_OCR == 124);

/// Convert milliseconds to scheduler ticks.
#[inline(always)]
pub const fn ms(ms: u16) -> Ticks {
    Ticks::new(((ms as u32 * TICK_HZ) / 1000) as u16)
}

impl Dp {
    #[rustfmt::skip]
    pub fn setup(&self, _: &MainInitCtx) {
        // Timer 0 configuration:
        // CTC mode, TOP = OCR0A, CS: 64 -> 1 ms per compare match.
        // SAFETY: Every bit pattern is valid for these registers.
        unsafe {
            self.TC0.tccr0b().write(|w| w.bits(0));
            self.TC0.tcnt0().write(|w| w.bits(0));
            self.TC0.ocr0a().write(|w| w.bits(TC0_OCR as u8));
            self.TC0.tccr0a().write(|w| w.bits(0b10)); // WGM01
            self.TC0.tifr0().write(|w| w.bits(0b111));
            self.TC0.timsk0().write(|w| w.bits(0b10)); // OCIE0A
            self.TC0.tccr0b().write(|w| w.bits(0b011)); // CS01 | CS00
        }
    }
}

pub fn irq_handler_timer0_compa(c: &IrqCtx) {
    SCHED.tick_cs(c.cs());
}

// vim: ts=4 sw=4 expandtab
