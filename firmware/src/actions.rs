use crate::mutex::IrqCtx;
use evq::{Scheduler, Ticks};

/// Everything the run loop can be asked to do.
///
/// Interrupt handlers push the input actions with a data word.
/// The periodic and delayed actions are scheduled with a data word of
/// zero. Their ids hash to distinct slots of the timer table,
/// so they never clobber each other.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    /// Voltage encoder moved. Data: signed step.
    VoltageKnob,
    /// Current encoder moved. Data: signed step.
    CurrentKnob,
    /// A push button was pressed. Data: [Button].
    Button,
    /// Averaged ADC reading of the current sense amplifier.
    CurrentSample,
    DisplayRefresh,
    BlinkToggle,
    /// Leave the current limit setting view.
    ModeTimeout,
    /// Settings have not been touched for a while.
    SaveSettings,
    /// Write the next EEPROM byte.
    EepromWrite,
    /// Publish the debug values.
    DebugSend,
    /// Stop showing the view label.
    LabelTimeout,
}

impl evq::Action for Action {
    #[inline(always)]
    fn id(&self) -> u8 {
        *self as u8
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Button {
    Voltage,
    Current,
    Top,
}

impl Button {
    pub fn from_data(data: u16) -> Option<Self> {
        match data {
            0 => Some(Self::Voltage),
            1 => Some(Self::Current),
            2 => Some(Self::Top),
            _ => None,
        }
    }
}

const QUEUE_SIZE: usize = 64;
const TIMER_SLOTS: usize = 16;

pub static SCHED: Scheduler<Action, QUEUE_SIZE, TIMER_SLOTS> = Scheduler::new();

/// Push an event from interrupt context.
///
/// Events that don't fit are dropped and counted by the queue.
#[inline(always)]
pub fn push_irq(c: &IrqCtx, action: Action, data: u16) {
    let _ = SCHED.push_cs(c.cs(), action, data);
}

/// (Re)start the countdown of a deferred action.
#[inline]
pub fn defer(action: Action, delay: Ticks) {
    // Clobbered slots are counted in the timer statistics.
    let _ = SCHED.schedule(action, 0, delay);
}

// vim: ts=4 sw=4 expandtab
