#![allow(unused_unsafe)]
#![cfg_attr(not(feature = "debug"), allow(dead_code))]

use crate::{
    hw::{FCPU, mcu},
    mutex::{CriticalSection, IrqCtx, LazyMainInit, MainInitCtx, Mutex},
};
use core::cell::Cell;

#[allow(non_snake_case)]
pub struct Dp {
    pub USART0: mcu::USART0,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static DP: LazyMainInit<Dp> = unsafe { LazyMainInit::uninit() };

const BAUD: u32 = 19_200;
const UBRR: u16 = (FCPU / (16 * BAUD) - 1) as u16;

const TXCIE: u8 = 1 << 6;
const TXEN: u8 = 1 << 3;
/// 8 data bits, no parity, 1 stop bit.
const UCSZ_8N1: u8 = 0b110;

#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Debug {
    QueueDropped,
    QueueHighWater,
    TimerRetried,
    TimerClobbered,
    CurrentMa,
    Voltage,
}
const NRVALUES: usize = 6;

/// Id of the frame that ends a round of values.
const END_ID: u8 = 0xFF;
const END_VALUE: u16 = 0xFFFF;

const INDEXSHIFT: usize = 2;
const INDEXMASK: u8 = (1 << INDEXSHIFT) - 1;
const END_INDEX: u8 = (NRVALUES as u8) << INDEXSHIFT;

static VALUES: Mutex<[Cell<u16>; NRVALUES]> = Mutex::new([const { Cell::new(0) }; NRVALUES]);
/// Value id in the upper bits, byte within the frame in the lower bits.
static INDEX: Mutex<Cell<u8>> = Mutex::new(Cell::new(0));

impl Dp {
    pub fn setup(&self, c: &MainInitCtx) {
        // SAFETY: Every bit pattern is valid for these registers.
        unsafe {
            self.USART0.ubrr0().write(|w| w.bits(UBRR));
            self.USART0.ucsr0a().write(|w| w.bits(0));
            self.USART0.ucsr0c().write(|w| w.bits(UCSZ_8N1));
            if cfg!(feature = "debug") {
                self.USART0.ucsr0b().write(|w| w.bits(TXCIE | TXEN));
            } else {
                self.USART0.ucsr0b().write(|w| w.bits(0));
            }
        }
        if cfg!(feature = "debug") {
            // The TX complete interrupt sends all following bytes.
            self.tx(END_ID);
            INDEX.borrow(c.cs()).set(END_INDEX + 1);
        }
    }

    fn tx(&self, data: u8) {
        // SAFETY: Every bit pattern is valid for this register.
        unsafe { self.USART0.udr0().write(|w| w.bits(data)) };
    }
}

/// Next byte of the frame stream. Advances the stream.
fn next_byte(cs: CriticalSection<'_>) -> u8 {
    let index = INDEX.borrow(cs);
    let i = index.get();
    let id = i >> INDEXSHIFT;
    let byte = i & INDEXMASK;

    let valid = (id as usize) < NRVALUES;
    let value = if valid {
        VALUES.borrow(cs)[id as usize].get()
    } else {
        END_VALUE
    };

    let data = match byte {
        0 => {
            if valid {
                id
            } else {
                END_ID
            }
        }
        1 => value as u8,
        _ => (value >> 8) as u8,
    };

    if byte < 2 {
        index.set(i + 1);
    } else if valid {
        index.set((id + 1) << INDEXSHIFT);
    } else {
        index.set(0);
    }
    data
}

pub fn irq_handler_usart_tx(c: &IrqCtx) {
    let data = next_byte(c.cs());
    DP.deref_irq(c).tx(data);
}

impl Debug {
    #[allow(unused_variables)]
    pub fn log_u16(&self, value: u16) {
        #[cfg(feature = "debug")]
        evq::irq::free(|cs| {
            VALUES.borrow(cs)[*self as usize].set(value);
        });
    }
}

// vim: ts=4 sw=4 expandtab
