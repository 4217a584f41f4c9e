#![allow(unused_unsafe)]

use crate::{
    actions::{Action, defer},
    hw::mcu,
    mutex::{IrqCtx, LazyMainInit, MainCtx, MainInitCtx, MutexCell},
    ports::{PB_SS, PORTB},
    timer::ms,
};
use avr_atomic::AvrAtomic;
use evq::Ticks;

#[allow(non_snake_case)]
pub struct Dp {
    pub SPI: mcu::SPI,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static DP: LazyMainInit<Dp> = unsafe { LazyMainInit::uninit() };

/// Time between two multiplex phases.
const REFRESH_PERIOD: Ticks = ms(4);
const BLINK_LIT: Ticks = ms(400);
const BLINK_DARK: Ticks = ms(100);
/// How long a view label is shown before the value.
const LABEL_TIME: Ticks = ms(1000);

/// Readout value of the "cur" text.
pub const READOUT_CUR: u16 = 3000;
/// Largest numerical readout. Larger values other than [READOUT_CUR] show "OL".
pub const READOUT_MAX: u16 = 2999;

const TENS: usize = 10;
const HUNDREDS: usize = 20;
const THOUSANDS: usize = 30;
const OL: usize = 33;
const DOTS: usize = 34;
const CUR: usize = 35;

/// Segment driver bits for both multiplex phases.
#[rustfmt::skip]
const SEGMENTS: [[u16; 2]; 36] = [
    [0b0000000000111001, 0b0000000001011010], // xxx0
    [0b0000000000110001, 0b0000000000000000], // xxx1
    [0b0000000000101001, 0b0000000001110010], // xxx2
    [0b0000000000111001, 0b0000000000110010], // xxx3
    [0b0000000000110001, 0b0000000000101010], // xxx4
    [0b0000000000011001, 0b0000000000111010], // xxx5
    [0b0000000000011001, 0b0000000001111010], // xxx6
    [0b0000000000111001, 0b0000000000000000], // xxx7
    [0b0000000000111001, 0b0000000001111010], // xxx8
    [0b0000000000111001, 0b0000000000111010], // xxx9
    [0b0000001011000001, 0b0000001110000010], // xx0x
    [0b0000000000000000, 0b0000000110000010], // xx1x
    [0b0000000111000001, 0b0000001100000010], // xx2x
    [0b0000000110000001, 0b0000001110000010], // xx3x
    [0b0000001100000001, 0b0000000110000010], // xx4x
    [0b0000001110000001, 0b0000001010000010], // xx5x
    [0b0000001111000001, 0b0000001010000010], // xx6x
    [0b0000000000000000, 0b0000001110000010], // xx7x
    [0b0000001111000001, 0b0000001110000010], // xx8x
    [0b0000001110000001, 0b0000001110000010], // xx9x
    [0b0001110000000001, 0b0010110000000010], // x0xx
    [0b0001100000000001, 0b0000000000000000], // x1xx
    [0b0001010000000001, 0b0011100000000010], // x2xx
    [0b0001110000000001, 0b0001100000000010], // x3xx
    [0b0001100000000001, 0b0001010000000010], // x4xx
    [0b0000110000000001, 0b0001110000000010], // x5xx
    [0b0000110000000001, 0b0011110000000010], // x6xx
    [0b0001110000000001, 0b0000000000000000], // x7xx
    [0b0001110000000001, 0b0011110000000010], // x8xx
    [0b0001110000000001, 0b0001110000000010], // x9xx
    [0b0000000000000000, 0b0000000000000000], // 0xxx, blank
    [0b0110000000000001, 0b0000000000000000], // 1xxx
    [0b1100000000000001, 0b1000000000000010], // 2xxx
    [0b0000001011000001, 0b0000001111011010], // OL
    [0b0000000000000000, 0b0000000000000110], // dots
    [0b0000000011000001, 0b0011100011100010], // cur
];

/// Segment word of `readout` for multiplex `phase` 0 or 1.
pub const fn segments(readout: u16, dots: bool, phase: usize) -> u16 {
    let phase = phase & 1;
    if readout <= READOUT_MAX {
        let r = readout as usize;
        let mut seg = SEGMENTS[THOUSANDS + r / 1000][phase]
            | SEGMENTS[HUNDREDS + (r % 1000) / 100][phase]
            | SEGMENTS[TENS + (r % 100) / 10][phase]
            | SEGMENTS[r % 10][phase];
        if dots {
            seg |= SEGMENTS[DOTS][phase];
        }
        seg
    } else if readout == READOUT_CUR {
        SEGMENTS[CUR][phase]
    } else {
        SEGMENTS[OL][phase]
    }
}

const _: () = assert!(segments(0, false, 1) == SEGMENTS[HUNDREDS][1] | SEGMENTS[TENS][1] | SEGMENTS[0][1]);
const _: () = assert!(segments(3001, true, 0) == SEGMENTS[OL][0]);
const _: () = assert!(segments(READOUT_CUR, true, 1) == SEGMENTS[CUR][1]);
const _: () = assert!(segments(READOUT_CUR, false, 0) != segments(READOUT_MAX, false, 0));

const SPIE: u8 = 1 << 7;
const SPE: u8 = 1 << 6;
const DORD: u8 = 1 << 5;
const MSTR: u8 = 1 << 4;
const CPOL: u8 = 1 << 3;

const SPI_IDLE: u8 = 0;
const SPI_LOW_BYTE: u8 = 1;
const SPI_HIGH_BYTE: u8 = 2;

static SPI_STATE: AvrAtomic<u8> = AvrAtomic::new();
static SPI_HIGH: AvrAtomic<u8> = AvrAtomic::new();

impl Dp {
    pub fn setup(&self, _: &MainInitCtx) {
        // LSB first, SCK idle high, FCPU / 4.
        // SAFETY: Every bit pattern is valid for this register.
        unsafe {
            self.SPI
                .spcr()
                .write(|w| w.bits(SPIE | SPE | DORD | MSTR | CPOL));
        }
    }

    /// Start sending a 16 bit word, low byte first.
    ///
    /// The high byte is sent from the transfer complete interrupt.
    /// Returns false, if the previous word is still being sent.
    fn send_word(&self, m: &MainCtx<'_>, word: u16) -> bool {
        if SPI_STATE.load() != SPI_IDLE {
            return false;
        }
        SPI_HIGH.store((word >> 8) as u8);
        SPI_STATE.store(SPI_LOW_BYTE);
        PORTB.deref(m).set(PB_SS, false);
        // SAFETY: Every bit pattern is valid for this register.
        unsafe { self.SPI.spdr().write(|w| w.bits(word as u8)) };
        true
    }
}

/// Serial transfer complete.
pub fn irq_handler_spi_stc(c: &IrqCtx) {
    if SPI_STATE.load() == SPI_LOW_BYTE {
        SPI_STATE.store(SPI_HIGH_BYTE);
        // SAFETY: Every bit pattern is valid for this register.
        unsafe {
            DP.deref_irq(c)
                .SPI
                .spdr()
                .write(|w| w.bits(SPI_HIGH.load()))
        };
    } else {
        // Latch the shift registers.
        PORTB.deref_irq(c).set(PB_SS, true);
        SPI_STATE.store(SPI_IDLE);
    }
}

pub struct Display {
    phase: MutexCell<u8>,
    blink: MutexCell<bool>,
    dark: MutexCell<bool>,
    label: MutexCell<bool>,
}

impl Display {
    pub const fn new() -> Self {
        Self {
            phase: MutexCell::new(0),
            blink: MutexCell::new(false),
            dark: MutexCell::new(false),
            label: MutexCell::new(false),
        }
    }

    /// Show the "cur" label for a while instead of the readout.
    pub fn show_label(&self, m: &MainCtx<'_>) {
        self.label.set(m, true);
        defer(Action::LabelTimeout, LABEL_TIME);
    }

    pub fn hide_label(&self, m: &MainCtx<'_>) {
        self.label.set(m, false);
    }

    pub fn label_shown(&self, m: &MainCtx<'_>) -> bool {
        self.label.get(m)
    }

    pub fn init(&self, _m: &MainCtx<'_>) {
        defer(Action::DisplayRefresh, REFRESH_PERIOD);
    }

    /// Show the next multiplex phase of `readout`.
    pub fn refresh(&self, m: &MainCtx<'_>, readout: u16, dots: bool) {
        defer(Action::DisplayRefresh, REFRESH_PERIOD);

        let phase = self.phase.get(m);
        let word = if self.dark.get(m) {
            0
        } else {
            segments(readout, dots, phase as usize)
        };
        if DP.deref(m).send_word(m, word) {
            self.phase.set(m, phase ^ 1);
        }
    }

    pub fn set_blink(&self, m: &MainCtx<'_>, blink: bool) {
        if blink == self.blink.get(m) {
            return;
        }
        self.blink.set(m, blink);
        if blink {
            defer(Action::BlinkToggle, BLINK_LIT);
        } else {
            self.dark.set(m, false);
        }
    }

    pub fn blink_toggle(&self, m: &MainCtx<'_>) {
        if !self.blink.get(m) {
            self.dark.set(m, false);
            return;
        }
        let dark = !self.dark.get(m);
        self.dark.set(m, dark);
        defer(
            Action::BlinkToggle,
            if dark { BLINK_DARK } else { BLINK_LIT },
        );
    }
}

// vim: ts=4 sw=4 expandtab
