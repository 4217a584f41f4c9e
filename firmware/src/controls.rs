use crate::{
    actions::{Action, Button, push_irq},
    mutex::{IrqCell, IrqCtx},
    ports::{PB_ENC_V_B, PD_ENC_I_B, PD_TOP_BTN, PORTB, PORTD},
};

/// Step for each (previous AB, current AB) transition.
/// Invalid double transitions are ignored.
const ENC_STATES: [i8; 16] = [0, 1, -1, 0, -1, 0, 0, 1, 1, 0, 0, -1, 0, -1, 1, 0];

const fn enc_step(old_ab: u8, ab: u8) -> i8 {
    ENC_STATES[((old_ab << 2) | ab) as usize]
}

const _: () = assert!(enc_step(0b00, 0b01) == 1);
const _: () = assert!(enc_step(0b01, 0b00) == -1);
const _: () = assert!(enc_step(0b01, 0b11) == 1);
const _: () = assert!(enc_step(0b11, 0b01) == -1);
// Missed transitions.
const _: () = assert!(enc_step(0b00, 0b11) == 0);
const _: () = assert!(enc_step(0b01, 0b10) == 0);

/// Quadrature decoder.
pub struct Encoder {
    old_ab: IrqCell<u8>,
}

impl Encoder {
    pub const fn new() -> Self {
        Self {
            old_ab: IrqCell::new(0),
        }
    }

    /// Feed the current phase (bit 1: A, bit 0: B) and get the step.
    fn update(&self, c: &IrqCtx<'_>, phase: u8) -> i8 {
        let ab = phase & 0b11;
        let old_ab = self.old_ab.get(c);
        self.old_ab.set(c, ab);
        enc_step(old_ab, ab)
    }
}

static ENC_VOLTAGE: Encoder = Encoder::new();
static ENC_CURRENT: Encoder = Encoder::new();
static TOP_BTN_DOWN: IrqCell<bool> = IrqCell::new(false);

/// Knob step as event data.
#[inline(always)]
pub const fn step_to_data(step: i8) -> u16 {
    step as u16
}

/// Event data as knob step.
#[inline(always)]
pub const fn data_to_step(data: u16) -> i16 {
    data as i16
}

fn push_step(c: &IrqCtx<'_>, action: Action, step: i8) {
    if step != 0 {
        push_irq(c, action, step_to_data(step));
    }
}

/// Voltage encoder.
pub fn irq_handler_pcint0(c: &IrqCtx) {
    let phase = PORTB.deref_irq(c).read() >> PB_ENC_V_B;
    let step = ENC_VOLTAGE.update(c, phase);
    push_step(c, Action::VoltageKnob, step);
}

/// Current encoder and top button.
pub fn irq_handler_pcint2(c: &IrqCtx) {
    let pind = PORTD.deref_irq(c).read();

    let step = ENC_CURRENT.update(c, pind >> PD_ENC_I_B);
    push_step(c, Action::CurrentKnob, step);

    let down = pind & (1 << PD_TOP_BTN) == 0;
    if down && !TOP_BTN_DOWN.get(c) {
        push_irq(c, Action::Button, Button::Top as u16);
    }
    TOP_BTN_DOWN.set(c, down);
}

/// Voltage encoder switch.
pub fn irq_handler_int0(c: &IrqCtx) {
    push_irq(c, Action::Button, Button::Voltage as u16);
}

/// Current encoder switch.
pub fn irq_handler_int1(c: &IrqCtx) {
    push_irq(c, Action::Button, Button::Current as u16);
}

const _: () = assert!(data_to_step(step_to_data(-1)) == -1);
const _: () = assert!(data_to_step(step_to_data(1)) == 1);

// vim: ts=4 sw=4 expandtab
