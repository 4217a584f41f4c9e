use crate::{
    actions::{Action, Button, SCHED, defer},
    analog::{self, Current},
    controls::data_to_step,
    debug::Debug,
    display::{Display, READOUT_CUR, READOUT_MAX},
    eeprom::{Eeprom, Settings},
    mutex::MainCtx,
    supply::{Mode, Supply},
    timer::ms,
};
use evq::Ticks;

/// Time until the current limit view returns to the previous view.
const MODE_TIMEOUT: Ticks = ms(2000);
/// Settings are stored after they have not been touched for this long.
const SAVE_DELAY: Ticks = ms(3000);
const DEBUG_PERIOD: Ticks = ms(100);

/// Output power in 10 mW.
/// Values that don't fit the display are shown as overload.
fn power(voltage: u16, current_ma: u16) -> u16 {
    let p = voltage as u32 * current_ma as u32 / 1000;
    if p > READOUT_MAX as u32 {
        u16::MAX
    } else {
        p as u16
    }
}

pub struct System {
    supply: Supply,
    current: Current,
    display: Display,
    eeprom: Eeprom,
}

impl System {
    pub const fn new() -> Self {
        Self {
            supply: Supply::new(),
            current: Current::new(),
            display: Display::new(),
            eeprom: Eeprom::new(),
        }
    }

    pub fn init(&self, m: &MainCtx<'_>) {
        let settings = self.eeprom.restore(m);
        self.supply
            .init(m, settings.voltage, settings.current_limit);
        self.display.init(m);
        analog::DP.deref(m).start(m);
        if cfg!(feature = "debug") {
            defer(Action::DebugSend, DEBUG_PERIOD);
        }
    }

    /// Value and decimal dots for the current display mode.
    fn readout(&self, m: &MainCtx<'_>) -> (u16, bool) {
        if self.display.label_shown(m) {
            return (READOUT_CUR, false);
        }
        match self.supply.mode(m) {
            Mode::Voltage => (self.supply.voltage(m), true),
            Mode::Current => (self.current.ma(m), false),
            Mode::CurrentSet => (self.supply.current_limit(m), false),
            Mode::Power => (power(self.supply.voltage(m), self.current.ma(m)), true),
        }
    }

    fn settings(&self, m: &MainCtx<'_>) -> Settings {
        Settings {
            voltage: self.supply.voltage(m),
            current_limit: self.supply.current_limit(m),
        }
    }

    fn button(&self, m: &MainCtx<'_>, button: Button) {
        let mode = match button {
            Button::Voltage => Mode::Voltage,
            Button::Current => Mode::Current,
            Button::Top => Mode::Power,
        };
        if mode == Mode::Current && self.supply.mode(m) != Mode::Current {
            self.display.show_label(m);
        } else if mode != Mode::Current {
            self.display.hide_label(m);
        }
        self.supply.set_mode(m, mode);
    }

    fn debug_send(&self, m: &MainCtx<'_>) {
        defer(Action::DebugSend, DEBUG_PERIOD);

        let queue = SCHED.queue_stats();
        let timers = SCHED.timer_stats();
        Debug::QueueDropped.log_u16(queue.dropped);
        Debug::QueueHighWater.log_u16(queue.high_water);
        Debug::TimerRetried.log_u16(timers.retried);
        Debug::TimerClobbered.log_u16(timers.clobbered);
        Debug::CurrentMa.log_u16(self.current.ma(m));
        Debug::Voltage.log_u16(self.supply.voltage(m));
    }

    /// Handle one event from the queue.
    pub fn dispatch(&self, m: &MainCtx<'_>, action: Action, data: u16) {
        match action {
            Action::VoltageKnob => {
                self.supply.adjust_voltage(m, data_to_step(data));
                self.supply.set_mode(m, Mode::Voltage);
                self.display.hide_label(m);
                defer(Action::SaveSettings, SAVE_DELAY);
            }
            Action::CurrentKnob => {
                self.supply.adjust_current_limit(m, data_to_step(data));
                self.supply.set_mode(m, Mode::CurrentSet);
                self.display.hide_label(m);
                defer(Action::ModeTimeout, MODE_TIMEOUT);
                defer(Action::SaveSettings, SAVE_DELAY);
            }
            Action::Button => {
                if let Some(button) = Button::from_data(data) {
                    self.button(m, button);
                }
            }
            Action::CurrentSample => {
                let ma = self.current.sample(m, data);
                let over_current = self.supply.regulate(m, ma);
                self.display.set_blink(m, over_current);
            }
            Action::DisplayRefresh => {
                let (readout, dots) = self.readout(m);
                self.display.refresh(m, readout, dots);
            }
            Action::BlinkToggle => {
                self.display.blink_toggle(m);
            }
            Action::ModeTimeout => {
                if self.supply.mode(m) == Mode::CurrentSet {
                    self.supply.return_previous_mode(m);
                }
            }
            Action::SaveSettings => {
                self.eeprom.store(m, self.settings(m));
            }
            Action::EepromWrite => {
                self.eeprom.write_next(m);
            }
            Action::DebugSend => {
                self.debug_send(m);
            }
            Action::LabelTimeout => {
                self.display.hide_label(m);
            }
        }
    }
}

// vim: ts=4 sw=4 expandtab
