use std::fmt;

/// Frame marking the end of one round of debug values.
pub const SYNC: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// Debug value identifiers. Must match the firmware's `debug::Debug`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DebugId {
    QueueDropped,
    QueueHighWater,
    TimerRetried,
    TimerClobbered,
    CurrentMa,
    Voltage,
}

impl DebugId {
    pub fn from_u8(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::QueueDropped),
            1 => Some(Self::QueueHighWater),
            2 => Some(Self::TimerRetried),
            3 => Some(Self::TimerClobbered),
            4 => Some(Self::CurrentMa),
            5 => Some(Self::Voltage),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::QueueDropped => "evq dropped",
            Self::QueueHighWater => "evq high water",
            Self::TimerRetried => "timer retried",
            Self::TimerClobbered => "timer clobbered",
            Self::CurrentMa => "current [mA]",
            Self::Voltage => "voltage [10 mV]",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DebugValue {
    pub id: DebugId,
    pub value: u16,
}

impl fmt::Display for DebugValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>16}: {}", self.id.name(), self.value)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Decoded {
    Value(DebugValue),
    /// A full round of values has been received.
    EndOfRound,
}

/// Splits the serial byte stream into `[id, lo, hi]` frames.
///
/// Bytes are discarded until a [SYNC] frame is seen.
/// Synchronization is dropped on any unknown id.
#[derive(Default)]
pub struct FrameDecoder {
    buf: [u8; 3],
    len: usize,
    synced: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn feed(&mut self, byte: u8) -> Option<Decoded> {
        if !self.synced {
            self.buf = [self.buf[1], self.buf[2], byte];
            self.len = (self.len + 1).min(3);
            if self.len == 3 && self.buf == SYNC {
                self.synced = true;
                self.len = 0;
                return Some(Decoded::EndOfRound);
            }
            return None;
        }

        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < 3 {
            return None;
        }
        self.len = 0;

        if self.buf == SYNC {
            return Some(Decoded::EndOfRound);
        }
        match DebugId::from_u8(self.buf[0]) {
            Some(id) => Some(Decoded::Value(DebugValue {
                id,
                value: u16::from_le_bytes([self.buf[1], self.buf[2]]),
            })),
            None => {
                self.synced = false;
                self.len = 3;
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn feed_all(dec: &mut FrameDecoder, bytes: &[u8]) -> Vec<Decoded> {
        bytes.iter().filter_map(|&b| dec.feed(b)).collect()
    }

    #[test]
    fn test_sync_and_decode() {
        let mut dec = FrameDecoder::new();
        let out = feed_all(
            &mut dec,
            &[0x12, 0x34, 0xFF, 0xFF, 0xFF, 0x00, 0x02, 0x00, 0x04, 0xE8, 0x03],
        );
        assert!(dec.is_synced());
        assert_eq!(
            out,
            [
                Decoded::EndOfRound,
                Decoded::Value(DebugValue {
                    id: DebugId::QueueDropped,
                    value: 2
                }),
                Decoded::Value(DebugValue {
                    id: DebugId::CurrentMa,
                    value: 1000
                }),
            ]
        );
    }

    #[test]
    fn test_value_0xffff() {
        let mut dec = FrameDecoder::new();
        let out = feed_all(&mut dec, &[0xFF, 0xFF, 0xFF, 0x05, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            out,
            [
                Decoded::EndOfRound,
                Decoded::Value(DebugValue {
                    id: DebugId::Voltage,
                    value: 0xFFFF
                }),
                Decoded::EndOfRound,
            ]
        );
    }

    #[test]
    fn test_resync_on_garbage() {
        let mut dec = FrameDecoder::new();
        feed_all(&mut dec, &SYNC);
        assert!(dec.is_synced());
        assert_eq!(dec.feed(0x42), None);
        assert_eq!(dec.feed(0x00), None);
        assert_eq!(dec.feed(0x00), None);
        assert!(!dec.is_synced());

        let out = feed_all(&mut dec, &[0xFF, 0xFF, 0xFF, 0x01, 0x07, 0x00]);
        assert!(dec.is_synced());
        assert_eq!(
            out,
            [
                Decoded::EndOfRound,
                Decoded::Value(DebugValue {
                    id: DebugId::QueueHighWater,
                    value: 7
                }),
            ]
        );
    }

    #[test]
    fn test_display() {
        let v = DebugValue {
            id: DebugId::TimerRetried,
            value: 3,
        };
        assert_eq!(v.to_string(), "   timer retried: 3");
    }
}

// vim: ts=4 sw=4 expandtab
