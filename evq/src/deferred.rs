//! Time deferred events.
//!
//! A fixed table of countdown entries. Each entry lives in the slot selected
//! by the hash of its event key. Scheduling into an occupied slot overwrites
//! the entry and restarts the countdown. That is how repeated requests for
//! the same action are debounced into a single delayed event.
//!
//! Distinct actions that hash to the same slot overwrite each other as well.
//! [DeferredTable::schedule] reports that case as [Scheduled::Clobbered].
//! Use [TimerPool](crate::TimerPool), if aliasing is not acceptable.

use crate::{
    event::{Action, Event, Ticks},
    irq::{self, CriticalSection, Mutex},
    queue::EventQueue,
};
use core::cell::Cell;

/// Outcome of scheduling a deferred event.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scheduled<A> {
    /// The slot was free.
    Armed,
    /// The same event was already pending. Its countdown was restarted.
    Restarted,
    /// A different pending event was overwritten and is lost.
    Clobbered(Event<A>),
}

/// Result of one [DeferredTable::tick].
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Entries handed over to the event queue.
    pub fired: u8,
    /// Expired entries that stay armed, because the event queue was full.
    pub retried: u8,
}

impl TickReport {
    pub(crate) fn add(&mut self, other: TickReport) {
        self.fired = self.fired.saturating_add(other.fired);
        self.retried = self.retried.saturating_add(other.retried);
    }
}

/// Deferred event counters for telemetry. All counters saturate.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerStats {
    pub fired: u16,
    pub retried: u16,
    pub clobbered: u16,
}

impl TimerStats {
    pub(crate) fn count_tick(&mut self, report: TickReport) {
        self.fired = self.fired.saturating_add(report.fired.into());
        self.retried = self.retried.saturating_add(report.retried.into());
    }
}

#[derive(Copy, Clone)]
pub(crate) struct Entry<A> {
    pub event: Event<A>,
    pub remaining: u16,
}

impl<A: Action> Entry<A> {
    pub fn new(event: Event<A>, delay: Ticks) -> Self {
        Self {
            event,
            remaining: delay.get(),
        }
    }

    /// Count down one tick and try to deliver the event, if it expired.
    ///
    /// Returns the entry that remains armed, or `None` if it was delivered.
    pub fn tick<const Q: usize>(
        mut self,
        cs: CriticalSection<'_>,
        queue: &EventQueue<A, Q>,
        report: &mut TickReport,
    ) -> Option<Self> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return Some(self);
        }
        match queue.push_cs(cs, self.event.action, self.event.data) {
            Ok(()) => {
                report.fired += 1;
                None
            }
            Err(_) => {
                // Try again on the next tick.
                self.remaining = 1;
                report.retried += 1;
                Some(self)
            }
        }
    }
}

/// Spread the event key over the table.
#[inline]
fn slot_index<const N: usize>(key: u32) -> usize {
    let h = key.wrapping_mul(0x9E37_79B9);
    ((h >> 16) as usize) % N
}

pub struct DeferredTable<A, const N: usize> {
    slots: Mutex<[Cell<Option<Entry<A>>>; N]>,
    stats: Mutex<Cell<TimerStats>>,
}

impl<A, const N: usize> DeferredTable<A, N> {
    pub const fn new() -> Self {
        const { assert!(N > 0 && N <= u8::MAX as usize) };
        Self {
            slots: Mutex::new([const { Cell::new(None) }; N]),
            stats: Mutex::new(Cell::new(TimerStats {
                fired: 0,
                retried: 0,
                clobbered: 0,
            })),
        }
    }
}

impl<A, const N: usize> Default for DeferredTable<A, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Action, const N: usize> DeferredTable<A, N> {
    /// Schedule `action` with `data` to be pushed to the event queue after `delay` ticks.
    ///
    /// Whatever occupies the slot is overwritten unconditionally.
    /// A delay of zero fires on the next tick.
    pub fn schedule_cs(
        &self,
        cs: CriticalSection<'_>,
        action: A,
        data: u16,
        delay: Ticks,
    ) -> Scheduled<A> {
        let event = Event::new(action, data);
        let key = event.key();
        let slot = &self.slots.borrow(cs)[slot_index::<N>(key)];
        match slot.replace(Some(Entry::new(event, delay))) {
            None => Scheduled::Armed,
            Some(prev) if prev.event.key() == key => Scheduled::Restarted,
            Some(prev) => {
                let stats = self.stats.borrow(cs);
                let mut s = stats.get();
                s.clobbered = s.clobbered.saturating_add(1);
                stats.set(s);
                Scheduled::Clobbered(prev.event)
            }
        }
    }

    pub fn schedule(&self, action: A, data: u16, delay: Ticks) -> Scheduled<A> {
        irq::free(|cs| self.schedule_cs(cs, action, data, delay))
    }

    /// Advance all armed entries by one tick. Expired entries are pushed
    /// into `queue` in slot order.
    ///
    /// To be called from the periodic timer interrupt.
    pub fn tick_cs<const Q: usize>(
        &self,
        cs: CriticalSection<'_>,
        queue: &EventQueue<A, Q>,
    ) -> TickReport {
        let mut report = TickReport::default();
        for slot in self.slots.borrow(cs) {
            if let Some(entry) = slot.get() {
                slot.set(entry.tick(cs, queue, &mut report));
            }
        }
        self.count_tick(cs, report);
        report
    }

    /// Same as [Self::tick_cs], but only keeps interrupts disabled
    /// while one slot is processed.
    ///
    /// An entry that an interrupt schedules during the scan into a slot
    /// that was not scanned yet is decremented by this tick already and
    /// fires one tick early. Call [Self::tick_cs] from the tick interrupt
    /// for exact delays.
    pub fn tick<const Q: usize>(&self, queue: &EventQueue<A, Q>) -> TickReport {
        let mut report = TickReport::default();
        for index in 0..N {
            irq::free(|cs| {
                let slot = &self.slots.borrow(cs)[index];
                if let Some(entry) = slot.get() {
                    let mut slot_report = TickReport::default();
                    slot.set(entry.tick(cs, queue, &mut slot_report));
                    self.count_tick(cs, slot_report);
                    report.add(slot_report);
                }
            });
        }
        report
    }

    fn count_tick(&self, cs: CriticalSection<'_>, report: TickReport) {
        if report != TickReport::default() {
            let stats = self.stats.borrow(cs);
            let mut s = stats.get();
            s.count_tick(report);
            stats.set(s);
        }
    }

    /// Number of armed entries.
    pub fn pending(&self) -> usize {
        irq::free(|cs| {
            self.slots
                .borrow(cs)
                .iter()
                .filter(|slot| slot.get().is_some())
                .count()
        })
    }

    /// Check whether exactly this event is armed.
    pub fn is_pending(&self, action: A, data: u16) -> bool {
        let key = Event::new(action, data).key();
        irq::free(|cs| {
            self.slots.borrow(cs)[slot_index::<N>(key)]
                .get()
                .is_some_and(|entry| entry.event.key() == key)
        })
    }

    pub fn stats(&self) -> TimerStats {
        irq::free(|cs| self.stats.borrow(cs).get())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::test::Act;

    fn ticks(
        table: &DeferredTable<Act, 16>,
        queue: &EventQueue<Act, 8>,
        count: u32,
    ) -> TickReport {
        let mut report = TickReport::default();
        for _ in 0..count {
            report.add(table.tick(queue));
        }
        report
    }

    #[test]
    fn test_fire_after_delay() {
        let table: DeferredTable<Act, 16> = DeferredTable::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();

        assert_eq!(table.schedule(Act::Save, 0, Ticks(10)), Scheduled::Armed);
        assert!(table.is_pending(Act::Save, 0));
        assert_eq!(ticks(&table, &queue, 9).fired, 0);
        assert!(queue.is_empty());

        let report = table.tick(&queue);
        assert_eq!(report, TickReport { fired: 1, retried: 0 });
        assert_eq!(queue.pop_front(), Some(Event::new(Act::Save, 0)));
        assert_eq!(table.pending(), 0);
        assert!(!table.is_pending(Act::Save, 0));

        // Retired. Never fires again.
        assert_eq!(ticks(&table, &queue, 100).fired, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_delay() {
        let table: DeferredTable<Act, 16> = DeferredTable::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();
        table.schedule(Act::Blink, 0, Ticks(0));
        assert!(queue.is_empty());
        assert_eq!(table.tick(&queue).fired, 1);
        assert_eq!(queue.pop_front(), Some(Event::new(Act::Blink, 0)));
    }

    #[test]
    fn test_debounce() {
        let table: DeferredTable<Act, 16> = DeferredTable::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();

        assert_eq!(table.schedule(Act::Save, 0, Ticks(100)), Scheduled::Armed);
        for _ in 0..10 {
            assert_eq!(ticks(&table, &queue, 50).fired, 0);
            assert_eq!(
                table.schedule(Act::Save, 0, Ticks(100)),
                Scheduled::Restarted
            );
        }
        assert_eq!(table.pending(), 1);
        assert_eq!(ticks(&table, &queue, 99).fired, 0);
        assert_eq!(ticks(&table, &queue, 1).fired, 1);
        assert_eq!(ticks(&table, &queue, 500).fired, 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_debounce_uses_latest_delay() {
        let table: DeferredTable<Act, 16> = DeferredTable::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();

        table.schedule(Act::Timeout, 0, Ticks(1000));
        ticks(&table, &queue, 10);
        table.schedule(Act::Timeout, 0, Ticks(5));
        assert_eq!(ticks(&table, &queue, 4).fired, 0);
        assert_eq!(ticks(&table, &queue, 1).fired, 1);
    }

    #[test]
    fn test_save_restarted_by_second_request() {
        // Request at tick 100 and again at tick 150, 3000 ticks delay each.
        let table: DeferredTable<Act, 16> = DeferredTable::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();
        let mut now = 0_u32;
        let mut fired_at = std::vec::Vec::new();
        while now < 3300 {
            if now == 100 || now == 150 {
                table.schedule(Act::Save, 0, Ticks(3000));
            }
            now += 1;
            if table.tick(&queue).fired > 0 {
                fired_at.push(now);
                queue.pop();
            }
        }
        // The first deadline (3100) passed silently.
        assert_eq!(fired_at, [3150]);
    }

    #[test]
    fn test_retry_on_full_queue() {
        let table: DeferredTable<Act, 16> = DeferredTable::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();
        for i in 0..8 {
            assert_eq!(queue.push(Act::Refresh, i), Ok(()));
        }

        table.schedule(Act::Save, 7, Ticks(3));
        assert_eq!(ticks(&table, &queue, 2), TickReport::default());
        for _ in 0..20 {
            assert_eq!(table.tick(&queue), TickReport { fired: 0, retried: 1 });
            assert!(table.is_pending(Act::Save, 7));
        }

        queue.pop();
        assert_eq!(table.tick(&queue), TickReport { fired: 1, retried: 0 });
        assert_eq!(table.pending(), 0);
        assert_eq!(ticks(&table, &queue, 10), TickReport::default());

        let mut delivered = 0;
        while let Some(e) = queue.pop_front() {
            if e == Event::new(Act::Save, 7) {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 1);

        let stats = table.stats();
        assert_eq!(stats.fired, 1);
        assert_eq!(stats.retried, 20);
    }

    #[test]
    fn test_simultaneous_expiry_in_slot_order() {
        let table: DeferredTable<Act, 16> = DeferredTable::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();
        let events = [
            Event::new(Act::Save, 0),
            Event::new(Act::Blink, 0),
            Event::new(Act::Timeout, 0),
            Event::new(Act::Refresh, 0),
        ];
        let mut expected = events;
        expected.sort_by_key(|e| slot_index::<16>(e.key()));
        // No aliasing between these events.
        for w in expected.windows(2) {
            assert_ne!(slot_index::<16>(w[0].key()), slot_index::<16>(w[1].key()));
        }

        for e in events.iter().rev() {
            assert_eq!(table.schedule(e.action, e.data, Ticks(5)), Scheduled::Armed);
        }
        assert_eq!(ticks(&table, &queue, 5).fired, 4);
        for e in expected {
            assert_eq!(queue.pop_front(), Some(e));
        }
    }

    #[test]
    fn test_alias_is_reported() {
        let table: DeferredTable<Act, 16> = DeferredTable::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();

        // Find a data word of another action that lands in the same slot.
        let first = Event::new(Act::Save, 0);
        let slot = slot_index::<16>(first.key());
        let alias = (0..=u16::MAX)
            .map(|d| Event::new(Act::Blink, d))
            .find(|e| slot_index::<16>(e.key()) == slot);
        let Some(alias) = alias else {
            panic!("No alias found");
        };

        assert_eq!(table.schedule(first.action, first.data, Ticks(5)), Scheduled::Armed);
        assert_eq!(
            table.schedule(alias.action, alias.data, Ticks(5)),
            Scheduled::Clobbered(first)
        );
        assert!(!table.is_pending(first.action, first.data));
        assert!(table.is_pending(alias.action, alias.data));
        assert_eq!(table.stats().clobbered, 1);

        ticks(&table, &queue, 5);
        assert_eq!(queue.pop_front(), Some(alias));
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn test_tick_cs() {
        let table: DeferredTable<Act, 16> = DeferredTable::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();
        table.schedule(Act::Refresh, 4, Ticks(2));
        assert_eq!(irq::free(|cs| table.tick_cs(cs, &queue)).fired, 0);
        assert_eq!(irq::free(|cs| table.tick_cs(cs, &queue)).fired, 1);
        assert_eq!(queue.front(), Some(Event::new(Act::Refresh, 4)));
        assert_eq!(table.stats().fired, 1);
    }
}

// vim: ts=4 sw=4 expandtab
