use crate::{
    deferred::{DeferredTable, Scheduled, TickReport, TimerStats},
    error::QueueFull,
    event::{Action, Event, Ticks},
    irq::{self, CriticalSection},
    queue::{EventQueue, QueueStats},
};

/// Event queue plus deferred event table.
///
/// Instantiate once, usually as a `static`, and hand out references
/// to interrupt handlers and to the run loop.
pub struct Scheduler<A, const Q: usize, const T: usize> {
    queue: EventQueue<A, Q>,
    timers: DeferredTable<A, T>,
}

impl<A, const Q: usize, const T: usize> Scheduler<A, Q, T> {
    pub const fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            timers: DeferredTable::new(),
        }
    }

    pub fn queue(&self) -> &EventQueue<A, Q> {
        &self.queue
    }

    pub fn timers(&self) -> &DeferredTable<A, T> {
        &self.timers
    }
}

impl<A, const Q: usize, const T: usize> Default for Scheduler<A, Q, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Action, const Q: usize, const T: usize> Scheduler<A, Q, T> {
    #[inline]
    pub fn push(&self, action: A, data: u16) -> Result<(), QueueFull> {
        self.queue.push(action, data)
    }

    #[inline]
    pub fn push_cs(&self, cs: CriticalSection<'_>, action: A, data: u16) -> Result<(), QueueFull> {
        self.queue.push_cs(cs, action, data)
    }

    #[inline]
    pub fn front(&self) -> Option<Event<A>> {
        self.queue.front()
    }

    #[inline]
    pub fn pop(&self) {
        self.queue.pop()
    }

    #[inline]
    pub fn schedule(&self, action: A, data: u16, delay: Ticks) -> Scheduled<A> {
        self.timers.schedule(action, data, delay)
    }

    #[inline]
    pub fn schedule_cs(
        &self,
        cs: CriticalSection<'_>,
        action: A,
        data: u16,
        delay: Ticks,
    ) -> Scheduled<A> {
        self.timers.schedule_cs(cs, action, data, delay)
    }

    /// Advance the deferred events by one tick.
    /// See [DeferredTable::tick] for the difference to [Self::tick_cs].
    #[inline]
    pub fn tick(&self) -> TickReport {
        self.timers.tick(&self.queue)
    }

    /// Periodic timer interrupt entry point.
    #[inline]
    pub fn tick_cs(&self, cs: CriticalSection<'_>) -> TickReport {
        self.timers.tick_cs(cs, &self.queue)
    }

    /// Run one event from the queue.
    ///
    /// `f` is called with interrupts enabled and must not block.
    /// The event is removed after `f` returned.
    /// Returns `false`, if there was nothing to do.
    pub fn run_once<F>(&self, f: F) -> bool
    where
        F: FnOnce(A, u16),
    {
        let Some(event) = self.queue.front() else {
            return false;
        };
        irq::fence();
        f(event.action, event.data);
        self.queue.pop();
        true
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn timer_stats(&self) -> TimerStats {
        self.timers.stats()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::test::Act;
    use core::cell::RefCell;

    #[test]
    fn test_run_loop() {
        let sched: Scheduler<Act, 3, 8> = Scheduler::new();
        assert!(!sched.run_once(|_, _| panic!("Queue is empty")));

        assert_eq!(sched.push(Act::Save, 0xA), Ok(()));
        assert_eq!(sched.push(Act::Blink, 0xB), Ok(()));
        assert_eq!(sched.push(Act::Timeout, 0xC), Ok(()));
        assert_eq!(sched.push(Act::Refresh, 0xD), Err(QueueFull));

        let seen = RefCell::new(std::vec::Vec::new());
        assert!(sched.run_once(|a, d| seen.borrow_mut().push((a, d))));
        assert_eq!(sched.push(Act::Refresh, 0xD), Ok(()));
        while sched.run_once(|a, d| seen.borrow_mut().push((a, d))) {}

        assert_eq!(
            *seen.borrow(),
            [
                (Act::Save, 0xA),
                (Act::Blink, 0xB),
                (Act::Timeout, 0xC),
                (Act::Refresh, 0xD)
            ]
        );
        assert_eq!(sched.queue_stats().dropped, 1);
    }

    #[test]
    fn test_handler_pushes_and_schedules() {
        let sched: Scheduler<Act, 8, 8> = Scheduler::new();
        let mut log = std::vec::Vec::new();

        sched.push(Act::Timeout, 0).ok();
        for now in 0..20_u16 {
            while sched.run_once(|a, d| {
                log.push((now, a, d));
                match a {
                    // Chain a deferred event from inside a handler.
                    Act::Timeout => {
                        sched.schedule(Act::Blink, d + 1, Ticks(5));
                    }
                    Act::Blink if d < 3 => {
                        sched.push(Act::Timeout, d).ok();
                    }
                    _ => (),
                }
            }) {}
            sched.tick();
        }

        assert_eq!(
            log,
            [
                (0, Act::Timeout, 0),
                (5, Act::Blink, 1),
                (5, Act::Timeout, 1),
                (10, Act::Blink, 2),
                (10, Act::Timeout, 2),
                (15, Act::Blink, 3),
            ]
        );
    }

    #[test]
    fn test_static_instance() {
        static SCHED: Scheduler<Act, 4, 4> = Scheduler::new();
        let isr = std::thread::spawn(|| {
            for _ in 0..3 {
                SCHED.schedule(Act::Save, 0, Ticks(2));
            }
            SCHED.tick();
            SCHED.tick();
        });
        assert!(isr.join().is_ok());
        assert_eq!(SCHED.front(), Some(Event::new(Act::Save, 0)));
        SCHED.pop();
        assert_eq!(SCHED.front(), None);
        assert_eq!(SCHED.timer_stats().fired, 1);
    }
}

// vim: ts=4 sw=4 expandtab
