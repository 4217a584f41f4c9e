#![allow(unused_unsafe)]

use crate::{
    actions::{Action, push_irq},
    history::History,
    hw::mcu,
    mutex::{IrqCell, IrqCtx, LazyMainInit, MainCtx, MainInitCtx, MutexCell},
};

#[allow(non_snake_case)]
pub struct Dp {
    pub ADC: mcu::ADC,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static DP: LazyMainInit<Dp> = unsafe { LazyMainInit::uninit() };

/// AVcc reference, ADC3 (PC3): current sense amplifier.
const ADMUX: u8 = (1 << 6) | 3;
const ADEN: u8 = 1 << 7;
const ADSC: u8 = 1 << 6;
const ADIF: u8 = 1 << 4;
const ADIE: u8 = 1 << 3;
/// ADC clock = FCPU / 128.
const ADPS_128: u8 = 0b111;
const ADC3D: u8 = 1 << 3;

/// Conversions summed up in the interrupt before an event is pushed.
const IRQ_SAMPLES: u8 = 8;

/// Events averaged in the main context.
const AVERAGES: usize = 10;

/// Convert an averaged ADC reading into mA.
///
/// 5 V reference, sense amplifier gain 10, 0.22 Ohm shunt.
/// The last factor is trimmed to the readout of a reference meter.
pub const fn adc_to_ma(adc: u16) -> u16 {
    ((adc as u32 * 500 / 1024) * 41 / 10) as u16
}

const _: () = assert!(adc_to_ma(0) == 0);
const _: () = assert!(adc_to_ma(1023) == 2045);

impl Dp {
    #[rustfmt::skip]
    pub fn setup(&self, _: &MainInitCtx) {
        // SAFETY: Every bit pattern is valid for these registers.
        unsafe {
            self.ADC.didr0().write(|w| w.bits(ADC3D));
            self.ADC.admux().write(|w| w.bits(ADMUX));
            self.ADC.adcsrb().write(|w| w.bits(0));
            self.ADC.adcsra().write(|w| w.bits(ADEN | ADIF | ADIE | ADPS_128));
        }
    }

    /// Start the first conversion. The interrupt starts all following.
    pub fn start(&self, _m: &MainCtx<'_>) {
        self.ADC.adcsra().modify(|r, w| {
            // SAFETY: Every bit pattern is valid for this register.
            unsafe { w.bits(r.bits() | ADSC) }
        });
    }
}

static IRQ_SUM: IrqCell<u16> = IrqCell::new(0);
static IRQ_COUNT: IrqCell<u8> = IrqCell::new(0);

/// Conversion complete.
pub fn irq_handler_adc(c: &IrqCtx) {
    let dp = DP.deref_irq(c);
    let sample = dp.ADC.adc().read().bits();
    dp.ADC.adcsra().modify(|r, w| {
        // SAFETY: Every bit pattern is valid for this register.
        unsafe { w.bits(r.bits() | ADSC) }
    });

    let sum = IRQ_SUM.get(c) + sample;
    let count = IRQ_COUNT.get(c) + 1;
    if count >= IRQ_SAMPLES {
        // If the queue is full, this one is dropped.
        // The next sum will be pushed after the next IRQ_SAMPLES conversions.
        push_irq(c, Action::CurrentSample, sum / IRQ_SAMPLES as u16);
        IRQ_SUM.set(c, 0);
        IRQ_COUNT.set(c, 0);
    } else {
        IRQ_SUM.set(c, sum);
        IRQ_COUNT.set(c, count);
    }
}

/// Load current measurement.
pub struct Current {
    hist: History<u16, AVERAGES>,
    ma: MutexCell<u16>,
}

impl Current {
    pub const fn new() -> Self {
        Self {
            hist: History::new([const { MutexCell::new(0) }; AVERAGES]),
            ma: MutexCell::new(0),
        }
    }

    /// Feed a new sample. Returns the averaged current in mA.
    pub fn sample(&self, m: &MainCtx<'_>, adc: u16) -> u16 {
        self.hist.push_back(m, adc.min(0x3FF));
        let ma = adc_to_ma(self.hist.average(m));
        self.ma.set(m, ma);
        ma
    }

    /// Averaged current in mA.
    pub fn ma(&self, m: &MainCtx<'_>) -> u16 {
        self.ma.get(m)
    }
}

// vim: ts=4 sw=4 expandtab
