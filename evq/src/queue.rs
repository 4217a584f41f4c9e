//! Bounded FIFO of pending events.
//!
//! Producers are interrupt handlers and the run loop itself.
//! The single consumer is the run loop.

use crate::{
    error::QueueFull,
    event::Event,
    irq::{self, CriticalSection, Mutex},
};
use core::cell::Cell;

/// Queue counters for telemetry.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueStats {
    /// Number of events rejected because the queue was full. Saturates.
    pub dropped: u16,
    /// Highest number of occupied slots seen so far.
    pub high_water: u16,
}

struct Inner<A, const N: usize> {
    buf: [Cell<Option<Event<A>>>; N],
    head: Cell<usize>,
    tail: Cell<usize>,
    occupied: Cell<usize>,
    dropped: Cell<u16>,
    high_water: Cell<u16>,
}

pub struct EventQueue<A, const N: usize> {
    inner: Mutex<Inner<A, N>>,
}

impl<A, const N: usize> EventQueue<A, N> {
    pub const fn new() -> Self {
        const { assert!(N > 0 && N <= u16::MAX as usize) };
        Self {
            inner: Mutex::new(Inner {
                buf: [const { Cell::new(None) }; N],
                head: Cell::new(0),
                tail: Cell::new(0),
                occupied: Cell::new(0),
                dropped: Cell::new(0),
                high_water: Cell::new(0),
            }),
        }
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<A, const N: usize> Default for EventQueue<A, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn next<const N: usize>(pos: usize) -> usize {
    if pos + 1 >= N { 0 } else { pos + 1 }
}

impl<A: Copy, const N: usize> EventQueue<A, N> {
    pub fn len_cs(&self, cs: CriticalSection<'_>) -> usize {
        self.inner.borrow(cs).occupied.get()
    }

    pub fn len(&self) -> usize {
        irq::free(|cs| self.len_cs(cs))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// Append an event at the tail.
    ///
    /// If the queue is full, the event is dropped and [QueueFull] is returned.
    pub fn push_cs(&self, cs: CriticalSection<'_>, action: A, data: u16) -> Result<(), QueueFull> {
        let q = self.inner.borrow(cs);
        let occupied = q.occupied.get();
        if occupied >= N {
            q.dropped.set(q.dropped.get().saturating_add(1));
            return Err(QueueFull);
        }
        let tail = q.tail.get();
        q.buf[tail].set(Some(Event::new(action, data)));
        q.tail.set(next::<N>(tail));
        q.occupied.set(occupied + 1);
        if occupied + 1 > q.high_water.get() as usize {
            q.high_water.set((occupied + 1) as u16);
        }
        Ok(())
    }

    /// Append an event at the tail.
    ///
    /// May be called from any context.
    pub fn push(&self, action: A, data: u16) -> Result<(), QueueFull> {
        irq::free(|cs| self.push_cs(cs, action, data))
    }

    pub fn front_cs(&self, cs: CriticalSection<'_>) -> Option<Event<A>> {
        let q = self.inner.borrow(cs);
        if q.occupied.get() == 0 {
            None
        } else {
            q.buf[q.head.get()].get()
        }
    }

    /// Get a copy of the oldest event without removing it.
    pub fn front(&self) -> Option<Event<A>> {
        irq::free(|cs| self.front_cs(cs))
    }

    pub fn pop_front_cs(&self, cs: CriticalSection<'_>) -> Option<Event<A>> {
        let q = self.inner.borrow(cs);
        let occupied = q.occupied.get();
        if occupied == 0 {
            return None;
        }
        let head = q.head.get();
        let event = q.buf[head].take();
        q.head.set(next::<N>(head));
        q.occupied.set(occupied - 1);
        event
    }

    /// Remove the oldest event. Does nothing, if the queue is empty.
    pub fn pop(&self) {
        irq::free(|cs| {
            self.pop_front_cs(cs);
        });
    }

    /// Remove and return the oldest event.
    pub fn pop_front(&self) -> Option<Event<A>> {
        irq::free(|cs| self.pop_front_cs(cs))
    }

    pub fn stats(&self) -> QueueStats {
        irq::free(|cs| {
            let q = self.inner.borrow(cs);
            QueueStats {
                dropped: q.dropped.get(),
                high_water: q.high_water.get(),
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::test::Act;

    #[test]
    fn test_fifo_order() {
        let q: EventQueue<Act, 8> = EventQueue::new();
        for i in 0..5 {
            assert_eq!(q.push(Act::Save, i), Ok(()));
        }
        assert_eq!(q.len(), 5);
        for i in 0..5 {
            assert_eq!(q.front(), Some(Event::new(Act::Save, i)));
            q.pop();
        }
        assert!(q.is_empty());
        assert_eq!(q.front(), None);
    }

    #[test]
    fn test_full() {
        let q: EventQueue<Act, 3> = EventQueue::new();
        assert_eq!(q.push(Act::Save, 0xA), Ok(()));
        assert_eq!(q.push(Act::Save, 0xB), Ok(()));
        assert_eq!(q.push(Act::Save, 0xC), Ok(()));
        assert!(q.is_full());
        assert_eq!(q.push(Act::Save, 0xD), Err(QueueFull));
        assert_eq!(q.len(), 3);

        q.pop();
        assert_eq!(q.push(Act::Save, 0xD), Ok(()));

        assert_eq!(q.pop_front(), Some(Event::new(Act::Save, 0xB)));
        assert_eq!(q.pop_front(), Some(Event::new(Act::Save, 0xC)));
        assert_eq!(q.pop_front(), Some(Event::new(Act::Save, 0xD)));
        assert_eq!(q.pop_front(), None);

        let stats = q.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.high_water, 3);
    }

    #[test]
    fn test_pop_empty() {
        let q: EventQueue<Act, 4> = EventQueue::new();
        q.pop();
        q.pop();
        assert_eq!(q.len(), 0);
        assert_eq!(q.push(Act::Blink, 1), Ok(()));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_front(), Some(Event::new(Act::Blink, 1)));
    }

    #[test]
    fn test_wrap_around() {
        let q: EventQueue<Act, 5> = EventQueue::new();
        let mut next_push = 0_u16;
        let mut next_pop = 0_u16;
        // Keep 3 events in flight, pass the end of the ring many times.
        for _ in 0..3 {
            assert_eq!(q.push(Act::Refresh, next_push), Ok(()));
            next_push += 1;
        }
        for _ in 0..100 {
            assert_eq!(q.push(Act::Refresh, next_push), Ok(()));
            next_push += 1;
            assert_eq!(q.pop_front().map(|e| e.data), Some(next_pop));
            next_pop += 1;
            assert!(q.len() <= q.capacity());
        }
        while let Some(e) = q.pop_front() {
            assert_eq!(e.data, next_pop);
            next_pop += 1;
        }
        assert_eq!(next_pop, next_push);
    }

    #[test]
    fn test_push_iff_not_full() {
        let q: EventQueue<Act, 4> = EventQueue::new();
        // Deterministic mix of pushes and pops.
        let pattern = [1, 1, 0, 1, 1, 1, 1, 0, 0, 1, 1, 1, 0, 0, 0, 0, 0, 1];
        for (i, &op) in pattern.iter().cycle().take(200).enumerate() {
            let before = q.len();
            if op == 1 {
                let res = q.push(Act::Timeout, i as u16);
                assert_eq!(res.is_err(), before == 4);
            } else {
                q.pop();
                assert_eq!(q.len(), before.saturating_sub(1));
            }
            assert!(q.len() <= 4);
        }
    }

    #[test]
    fn test_concurrent_producers() {
        static Q: EventQueue<Act, 64> = EventQueue::new();
        let producers: std::vec::Vec<_> = (0..4_u16)
            .map(|p| {
                std::thread::spawn(move || {
                    for i in 0..10 {
                        while Q.push(Act::Save, (p << 8) | i).is_err() {
                            std::thread::yield_now();
                        }
                    }
                })
            })
            .collect();
        for p in producers {
            assert!(p.join().is_ok());
        }

        // Per producer order is preserved.
        let mut last = [None::<u16>; 4];
        let mut count = 0;
        while let Some(e) = Q.pop_front() {
            let p = (e.data >> 8) as usize;
            let i = e.data & 0xFF;
            if let Some(prev) = last[p] {
                assert!(i > prev);
            }
            last[p] = Some(i);
            count += 1;
        }
        assert_eq!(count, 40);
    }

    #[test]
    fn test_push_during_pop() {
        const COUNT: u16 = 20000;
        static Q: EventQueue<Act, 8> = EventQueue::new();
        let producer = std::thread::spawn(|| {
            for i in 0..COUNT {
                while Q.push(Act::Refresh, i).is_err() {
                    std::thread::yield_now();
                }
            }
        });

        // Consume while the producer is still pushing.
        let mut expected = 0;
        while expected < COUNT {
            assert!(Q.len() <= Q.capacity());
            match Q.front() {
                Some(e) => {
                    assert_eq!(e.data, expected);
                    Q.pop();
                    expected += 1;
                }
                None => std::thread::yield_now(),
            }
        }
        assert!(producer.join().is_ok());
        assert!(Q.is_empty());
        assert!(Q.stats().high_water as usize <= Q.capacity());
    }
}

// vim: ts=4 sw=4 expandtab
