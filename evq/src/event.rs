use derive_more::{From, Into};

/// A closed set of deferred actions.
///
/// Usually implemented by a fieldless `#[repr(u8)]` enum.
/// The [Action::id] is the identity of the action. It is used for
/// debouncing and for hashing into the [DeferredTable](crate::DeferredTable).
/// Two different actions must never return the same id.
pub trait Action: Copy {
    fn id(&self) -> u8;
}

/// An action plus its data word.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event<A> {
    pub action: A,
    pub data: u16,
}

impl<A> Event<A> {
    #[inline]
    pub const fn new(action: A, data: u16) -> Self {
        Self { action, data }
    }
}

impl<A: Action> Event<A> {
    /// Identity of this event: action id in the upper half, data in the lower half.
    #[inline]
    pub fn key(&self) -> u32 {
        ((self.action.id() as u32) << 16) | self.data as u32
    }
}

/// Relative delay in timer ticks.
///
/// The tick period is defined by whoever calls the periodic `tick()`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Debug, From, Into)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ticks(pub u16);

impl Ticks {
    #[inline]
    pub const fn new(ticks: u16) -> Self {
        Self(ticks)
    }

    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    #[repr(u8)]
    pub enum Act {
        Save,
        Blink,
        Timeout,
        Refresh,
    }

    impl Action for Act {
        fn id(&self) -> u8 {
            *self as u8
        }
    }

    #[test]
    fn test_key() {
        assert_eq!(Event::new(Act::Save, 0).key(), 0x0000_0000);
        assert_eq!(Event::new(Act::Blink, 0x1234).key(), 0x0001_1234);
        assert_eq!(Event::new(Act::Refresh, 0xFFFF).key(), 0x0003_FFFF);
        assert_ne!(
            Event::new(Act::Save, 1).key(),
            Event::new(Act::Blink, 1).key()
        );
    }

    #[test]
    fn test_ticks_conv() {
        let t: Ticks = 3000.into();
        assert_eq!(t, Ticks::new(3000));
        let raw: u16 = t.into();
        assert_eq!(raw, 3000);
        assert!(Ticks::new(1) < Ticks::new(2));
    }
}

// vim: ts=4 sw=4 expandtab
