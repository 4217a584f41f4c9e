#![allow(unused_unsafe)]

use crate::{
    actions::{Action, defer},
    hw::mcu,
    mutex::{LazyMainInit, MainCtx, MutexCell},
    supply::{
        CURRENT_LIMIT_DEFAULT, CURRENT_LIMIT_MAX, CURRENT_LIMIT_MIN, VOLTAGE_DEFAULT, VOLTAGE_MAX,
        VOLTAGE_MIN, clamp_current_limit, clamp_voltage,
    },
    timer::ms,
};
use evq::{Ticks, irq};

#[allow(non_snake_case)]
pub struct Dp {
    pub EEPROM: mcu::EEPROM,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static DP: LazyMainInit<Dp> = unsafe { LazyMainInit::uninit() };

const EERE: u8 = 1 << 0;
const EEPE: u8 = 1 << 1;
const EEMPE: u8 = 1 << 2;

/// Marks a written settings image.
const MAGIC: u8 = 0x5A;
/// Image layout: magic, voltage (LE), current limit (LE).
const IMAGE_LEN: usize = 5;

/// Poll interval while a byte write is in progress.
const WRITE_POLL: Ticks = ms(1);

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Output voltage setpoint in 10 mV.
    pub voltage: u16,
    /// Current limit in mA.
    pub current_limit: u16,
}

impl Settings {
    const DEFAULT: Self = Self {
        voltage: VOLTAGE_DEFAULT,
        current_limit: CURRENT_LIMIT_DEFAULT,
    };

    const fn to_image(self) -> [u8; IMAGE_LEN] {
        let v = self.voltage.to_le_bytes();
        let c = self.current_limit.to_le_bytes();
        [MAGIC, v[0], v[1], c[0], c[1]]
    }

    const fn from_image(image: [u8; IMAGE_LEN]) -> Option<Self> {
        if image[0] != MAGIC {
            return None;
        }
        Some(Self {
            voltage: clamp_voltage(u16::from_le_bytes([image[1], image[2]])),
            current_limit: clamp_current_limit(u16::from_le_bytes([image[3], image[4]])),
        })
    }

    /// Decode a stored image. Defaults, if it was never written.
    const fn from_image_or_default(image: [u8; IMAGE_LEN]) -> Self {
        match Self::from_image(image) {
            Some(settings) => settings,
            None => Self::DEFAULT,
        }
    }
}

const _: () = {
    let image = Settings {
        voltage: 1000,
        current_limit: 1500,
    }
    .to_image();
    assert!(image[0] == 0x5A && image[1] == 0xE8 && image[2] == 0x03);
    assert!(image[3] == 0xDC && image[4] == 0x05);
    assert!(matches!(
        Settings::from_image(image),
        Some(Settings {
            voltage: 1000,
            current_limit: 1500
        })
    ));
};
// Erased EEPROM.
const _: () = assert!(Settings::from_image([0xFF; IMAGE_LEN]).is_none());
const _: () = assert!(matches!(
    Settings::from_image_or_default([0xFF; IMAGE_LEN]),
    Settings {
        voltage: 150,
        current_limit: 200
    }
));
const _: () = assert!(matches!(
    Settings::from_image([MAGIC, 0x00, 0x00, 0xFF, 0xFF]),
    Some(Settings {
        voltage: VOLTAGE_MIN,
        current_limit: CURRENT_LIMIT_MAX
    })
));
const _: () = assert!(matches!(
    Settings::from_image([MAGIC, 0xFF, 0xFF, 0x00, 0x00]),
    Some(Settings {
        voltage: VOLTAGE_MAX,
        current_limit: CURRENT_LIMIT_MIN
    })
));

impl Dp {
    fn busy(&self) -> bool {
        self.EEPROM.eecr().read().bits() & EEPE != 0
    }

    fn read(&self, addr: u16) -> u8 {
        while self.busy() {}
        // SAFETY: Every bit pattern is valid for these registers.
        unsafe {
            self.EEPROM.eear().write(|w| w.bits(addr));
            self.EEPROM.eecr().write(|w| w.bits(EERE));
        }
        self.EEPROM.eedr().read().bits()
    }

    /// Start writing one byte. The caller must ensure that we are not busy.
    fn write(&self, addr: u16, data: u8) {
        // EEPE must be set within 4 cycles after EEMPE.
        irq::free(|_cs| {
            // SAFETY: Every bit pattern is valid for these registers.
            unsafe {
                self.EEPROM.eear().write(|w| w.bits(addr));
                self.EEPROM.eedr().write(|w| w.bits(data));
                self.EEPROM.eecr().write(|w| w.bits(EEMPE));
                self.EEPROM.eecr().write(|w| w.bits(EEMPE | EEPE));
            }
        });
    }
}

/// Settings persistence.
///
/// Writes are spread over [Action::EepromWrite] events,
/// one byte per event, so that the run loop never waits
/// for the EEPROM.
pub struct Eeprom {
    image: MutexCell<[u8; IMAGE_LEN]>,
    index: MutexCell<u8>,
}

impl Eeprom {
    pub const fn new() -> Self {
        Self {
            image: MutexCell::new([0; IMAGE_LEN]),
            index: MutexCell::new(IMAGE_LEN as u8),
        }
    }

    /// Read the stored settings. Defaults, if nothing was ever stored.
    pub fn restore(&self, m: &MainCtx<'_>) -> Settings {
        let dp = DP.deref(m);
        let mut image = [0; IMAGE_LEN];
        for (addr, byte) in image.iter_mut().enumerate() {
            *byte = dp.read(addr as u16);
        }
        Settings::from_image_or_default(image)
    }

    /// Start storing `settings`. A store in progress is restarted.
    pub fn store(&self, m: &MainCtx<'_>, settings: Settings) {
        self.image.set(m, settings.to_image());
        self.index.set(m, 0);
        defer(Action::EepromWrite, Ticks::new(0));
    }

    /// Write the next byte of the image, skipping unchanged bytes.
    pub fn write_next(&self, m: &MainCtx<'_>) {
        let index = self.index.get(m) as usize;
        if index >= IMAGE_LEN {
            return;
        }
        let dp = DP.deref(m);
        if dp.busy() {
            defer(Action::EepromWrite, WRITE_POLL);
            return;
        }

        let addr = index as u16;
        let byte = self.image.get(m)[index];
        if dp.read(addr) != byte {
            dp.write(addr, byte);
        }

        let index = index + 1;
        self.index.set(m, index as u8);
        if index < IMAGE_LEN {
            defer(Action::EepromWrite, WRITE_POLL);
        }
    }
}

// vim: ts=4 sw=4 expandtab
