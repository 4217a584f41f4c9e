#![allow(unused_unsafe)]

use crate::{
    hw::mcu,
    mutex::{LazyMainInit, MainCtx, MainInitCtx, MutexCell},
    ports::{PC_MINILOAD, PORTC},
};

#[allow(non_snake_case)]
pub struct Dp {
    pub TC1: mcu::TC1,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static DP: LazyMainInit<Dp> = unsafe { LazyMainInit::uninit() };

/// Output voltage setpoint limits, in 10 mV.
pub const VOLTAGE_MIN: u16 = 125;
pub const VOLTAGE_MAX: u16 = 1060;
pub const VOLTAGE_DEFAULT: u16 = 150;
pub const VOLTAGE_STEP: i16 = 5;

/// Current limit, in mA.
pub const CURRENT_LIMIT_MIN: u16 = 10;
pub const CURRENT_LIMIT_MAX: u16 = 2999;
pub const CURRENT_LIMIT_DEFAULT: u16 = 200;
pub const CURRENT_LIMIT_STEP: i16 = 10;

/// Below this load current the mini-load is switched on.
const MINILOAD_THRES: u16 = 20;

/// PWM period, TOP value of timer 1.
const PWM_TOP: u16 = 1000;
/// Compare value offset of the output stage.
const PWM_OFFSET: u16 = 4;

/// Timer 1 compare value for a voltage setpoint.
pub const fn voltage_to_pwm(voltage: u16) -> u16 {
    if voltage > VOLTAGE_MIN {
        voltage - VOLTAGE_MIN + PWM_OFFSET
    } else {
        0
    }
}

const _: () = assert!(voltage_to_pwm(VOLTAGE_MIN) == 0);
const _: () = assert!(voltage_to_pwm(VOLTAGE_DEFAULT) == 29);
const _: () = assert!(voltage_to_pwm(VOLTAGE_MAX) < PWM_TOP);

fn clamp_step(value: u16, step: i16, min: u16, max: u16) -> u16 {
    (value as i16).saturating_add(step).clamp(min as i16, max as i16) as u16
}

const fn clamp(value: u16, min: u16, max: u16) -> u16 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

pub const fn clamp_voltage(voltage: u16) -> u16 {
    clamp(voltage, VOLTAGE_MIN, VOLTAGE_MAX)
}

pub const fn clamp_current_limit(limit: u16) -> u16 {
    clamp(limit, CURRENT_LIMIT_MIN, CURRENT_LIMIT_MAX)
}

/// What the display shows.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Voltage,
    Current,
    CurrentSet,
    Power,
}

impl Dp {
    #[rustfmt::skip]
    pub fn setup(&self, _: &MainInitCtx) {
        // Timer 1 configuration:
        // Fast PWM, TOP = ICR1, non-inverting OC1A, no prescaler.
        // SAFETY: Every bit pattern is valid for these registers.
        unsafe {
            self.TC1.tccr1b().write(|w| w.bits(0));
            self.TC1.tcnt1().write(|w| w.bits(0));
            self.TC1.icr1().write(|w| w.bits(PWM_TOP));
            self.TC1.ocr1a().write(|w| w.bits(0));
            self.TC1.tccr1a().write(|w| w.bits(0b1000_0010)); // COM1A1 | WGM11
            self.TC1.tccr1b().write(|w| w.bits(0b0001_1001)); // WGM13 | WGM12 | CS10
        }
    }

    fn set_pwm(&self, value: u16) {
        // SAFETY: Every value below TOP is valid.
        unsafe { self.TC1.ocr1a().write(|w| w.bits(value.min(PWM_TOP))) };
    }
}

pub struct Supply {
    voltage: MutexCell<u16>,
    current_limit: MutexCell<u16>,
    mode: MutexCell<Mode>,
    prev_mode: MutexCell<Mode>,
    /// Shift register of recent over-current states. Bit 0 is the newest.
    limit_status: MutexCell<u16>,
}

impl Supply {
    pub const fn new() -> Self {
        Self {
            voltage: MutexCell::new(VOLTAGE_DEFAULT),
            current_limit: MutexCell::new(CURRENT_LIMIT_DEFAULT),
            mode: MutexCell::new(Mode::Voltage),
            prev_mode: MutexCell::new(Mode::Voltage),
            limit_status: MutexCell::new(0),
        }
    }

    pub fn init(&self, m: &MainCtx<'_>, voltage: u16, current_limit: u16) {
        self.set_current_limit(m, current_limit);
        self.set_voltage(m, voltage);
    }

    pub fn voltage(&self, m: &MainCtx<'_>) -> u16 {
        self.voltage.get(m)
    }

    pub fn set_voltage(&self, m: &MainCtx<'_>, voltage: u16) {
        let voltage = clamp_voltage(voltage);
        self.voltage.set(m, voltage);
        if !self.in_over_current(m) {
            DP.deref(m).set_pwm(voltage_to_pwm(voltage));
        }
    }

    pub fn adjust_voltage(&self, m: &MainCtx<'_>, steps: i16) {
        let voltage = clamp_step(
            self.voltage(m),
            steps.saturating_mul(VOLTAGE_STEP),
            VOLTAGE_MIN,
            VOLTAGE_MAX,
        );
        self.set_voltage(m, voltage);
    }

    pub fn current_limit(&self, m: &MainCtx<'_>) -> u16 {
        self.current_limit.get(m)
    }

    pub fn set_current_limit(&self, m: &MainCtx<'_>, limit: u16) {
        self.current_limit.set(m, clamp_current_limit(limit));
    }

    pub fn adjust_current_limit(&self, m: &MainCtx<'_>, steps: i16) {
        let limit = clamp_step(
            self.current_limit(m),
            steps.saturating_mul(CURRENT_LIMIT_STEP),
            CURRENT_LIMIT_MIN,
            CURRENT_LIMIT_MAX,
        );
        self.set_current_limit(m, limit);
    }

    pub fn mode(&self, m: &MainCtx<'_>) -> Mode {
        self.mode.get(m)
    }

    pub fn set_mode(&self, m: &MainCtx<'_>, mode: Mode) {
        let cur = self.mode(m);
        if mode != cur {
            self.prev_mode.set(m, cur);
            self.mode.set(m, mode);
        }
    }

    pub fn return_previous_mode(&self, m: &MainCtx<'_>) {
        self.set_mode(m, self.prev_mode.get(m));
    }

    fn in_over_current(&self, m: &MainCtx<'_>) -> bool {
        self.limit_status.get(m) & 1 != 0
    }

    /// Run the current limiter with a new current measurement.
    ///
    /// Returns whether the over-current indication shall be active.
    /// It stays active until 16 consecutive measurements were in range.
    pub fn regulate(&self, m: &MainCtx<'_>, current_ma: u16) -> bool {
        PORTC
            .deref(m)
            .set(PC_MINILOAD, current_ma < MINILOAD_THRES);

        let over = current_ma >= self.current_limit(m);
        let status = (self.limit_status.get(m) << 1) | over as u16;
        self.limit_status.set(m, status);

        if over {
            DP.deref(m).set_pwm(0);
        } else {
            DP.deref(m).set_pwm(voltage_to_pwm(self.voltage(m)));
        }
        status != 0
    }
}

// vim: ts=4 sw=4 expandtab
