//! Deferred events without aliasing.
//!
//! A fixed pool of nodes, linked by index into a list of armed entries
//! and a list of free nodes. Every pending event owns exactly one node,
//! identified by its full event key. Nodes are recycled through the free
//! list when their event was delivered.

use crate::{
    deferred::{Entry, Scheduled, TickReport},
    error::PoolFull,
    event::{Action, Event, Ticks},
    irq::{self, CriticalSection, Mutex},
    queue::EventQueue,
};
use core::cell::Cell;

/// End of list marker.
const NIL: u8 = u8::MAX;

#[derive(Copy, Clone)]
struct Node<A> {
    entry: Option<Entry<A>>,
    next: u8,
}

impl<A> Node<A> {
    const fn free(next: u8) -> Self {
        Self { entry: None, next }
    }
}

struct Inner<A, const N: usize> {
    nodes: [Cell<Node<A>>; N],
    /// Head of the list of armed nodes.
    armed: Cell<u8>,
    /// Head of the list of recycled nodes.
    free: Cell<u8>,
    /// Nodes at and above this index have never been used.
    unused: Cell<u8>,
}

impl<A: Copy, const N: usize> Inner<A, N> {
    fn alloc(&self) -> Option<u8> {
        let free = self.free.get();
        if free != NIL {
            self.free.set(self.nodes[free as usize].get().next);
            Some(free)
        } else {
            let unused = self.unused.get();
            if (unused as usize) < N {
                self.unused.set(unused + 1);
                Some(unused)
            } else {
                None
            }
        }
    }

    fn release(&self, index: u8) {
        self.nodes[index as usize].set(Node::free(self.free.get()));
        self.free.set(index);
    }
}

pub struct TimerPool<A, const N: usize> {
    inner: Mutex<Inner<A, N>>,
}

impl<A, const N: usize> TimerPool<A, N> {
    pub const fn new() -> Self {
        const { assert!(N > 0 && N < NIL as usize) };
        Self {
            inner: Mutex::new(Inner {
                nodes: [const { Cell::new(Node::free(NIL)) }; N],
                armed: Cell::new(NIL),
                free: Cell::new(NIL),
                unused: Cell::new(0),
            }),
        }
    }
}

impl<A, const N: usize> Default for TimerPool<A, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Action, const N: usize> TimerPool<A, N> {
    /// Find the armed node holding `key`.
    fn find(&self, cs: CriticalSection<'_>, key: u32) -> Option<u8> {
        let p = self.inner.borrow(cs);
        let mut cur = p.armed.get();
        while cur != NIL {
            let node = p.nodes[cur as usize].get();
            if node.entry.is_some_and(|e| e.event.key() == key) {
                return Some(cur);
            }
            cur = node.next;
        }
        None
    }

    /// Schedule `action` with `data` to be pushed to the event queue after `delay` ticks.
    ///
    /// If the same event is already armed, its countdown is restarted.
    /// Otherwise a free node is taken from the pool.
    pub fn schedule_cs(
        &self,
        cs: CriticalSection<'_>,
        action: A,
        data: u16,
        delay: Ticks,
    ) -> Result<Scheduled<A>, PoolFull> {
        let p = self.inner.borrow(cs);
        let event = Event::new(action, data);
        let entry = Some(Entry::new(event, delay));

        if let Some(index) = self.find(cs, event.key()) {
            let node = &p.nodes[index as usize];
            node.set(Node {
                entry,
                next: node.get().next,
            });
            return Ok(Scheduled::Restarted);
        }

        let index = p.alloc().ok_or(PoolFull)?;
        p.nodes[index as usize].set(Node {
            entry,
            next: p.armed.get(),
        });
        p.armed.set(index);
        Ok(Scheduled::Armed)
    }

    pub fn schedule(&self, action: A, data: u16, delay: Ticks) -> Result<Scheduled<A>, PoolFull> {
        irq::free(|cs| self.schedule_cs(cs, action, data, delay))
    }

    /// Advance all armed entries by one tick.
    ///
    /// Expired entries are pushed into `queue` in list order,
    /// which is most recently armed first.
    pub fn tick_cs<const Q: usize>(
        &self,
        cs: CriticalSection<'_>,
        queue: &EventQueue<A, Q>,
    ) -> TickReport {
        let p = self.inner.borrow(cs);
        let mut report = TickReport::default();
        let mut prev = NIL;
        let mut cur = p.armed.get();
        while cur != NIL {
            let node = p.nodes[cur as usize].get();
            let next = node.next;
            match node.entry.and_then(|e| e.tick(cs, queue, &mut report)) {
                Some(entry) => {
                    p.nodes[cur as usize].set(Node {
                        entry: Some(entry),
                        next,
                    });
                    prev = cur;
                }
                None => {
                    // Delivered. Unlink and recycle.
                    if prev == NIL {
                        p.armed.set(next);
                    } else {
                        let prev_node = &p.nodes[prev as usize];
                        prev_node.set(Node {
                            entry: prev_node.get().entry,
                            next,
                        });
                    }
                    p.release(cur);
                }
            }
            cur = next;
        }
        report
    }

    /// The list is walked with interrupts disabled.
    pub fn tick<const Q: usize>(&self, queue: &EventQueue<A, Q>) -> TickReport {
        irq::free(|cs| self.tick_cs(cs, queue))
    }

    /// Number of armed entries.
    pub fn pending(&self) -> usize {
        irq::free(|cs| {
            let p = self.inner.borrow(cs);
            let mut count = 0;
            let mut cur = p.armed.get();
            while cur != NIL {
                count += 1;
                cur = p.nodes[cur as usize].get().next;
            }
            count
        })
    }

    pub fn is_pending(&self, action: A, data: u16) -> bool {
        let key = Event::new(action, data).key();
        irq::free(|cs| self.find(cs, key).is_some())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::test::Act;

    fn ticks(pool: &TimerPool<Act, 4>, queue: &EventQueue<Act, 8>, count: u32) -> TickReport {
        let mut report = TickReport::default();
        for _ in 0..count {
            report.add(pool.tick(queue));
        }
        report
    }

    #[test]
    fn test_exhaustion_and_reuse() {
        let pool: TimerPool<Act, 4> = TimerPool::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();

        for i in 0..4 {
            assert_eq!(pool.schedule(Act::Save, i, Ticks(i + 1)), Ok(Scheduled::Armed));
        }
        assert_eq!(pool.pending(), 4);
        assert_eq!(pool.schedule(Act::Save, 4, Ticks(1)), Err(PoolFull));
        // Restarting an armed event needs no new node.
        assert_eq!(pool.schedule(Act::Save, 3, Ticks(4)), Ok(Scheduled::Restarted));

        assert_eq!(ticks(&pool, &queue, 4).fired, 4);
        assert_eq!(pool.pending(), 0);
        for i in 0..4 {
            assert_eq!(queue.pop_front(), Some(Event::new(Act::Save, i)));
        }

        // All nodes went back to the free list.
        for i in 10..14 {
            assert_eq!(pool.schedule(Act::Blink, i, Ticks(2)), Ok(Scheduled::Armed));
        }
        assert_eq!(pool.schedule(Act::Blink, 14, Ticks(2)), Err(PoolFull));
        assert_eq!(ticks(&pool, &queue, 2).fired, 4);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_unlink_middle() {
        let pool: TimerPool<Act, 4> = TimerPool::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();

        // List order: Refresh, Timeout, Blink, Save.
        pool.schedule(Act::Save, 0, Ticks(30)).ok();
        pool.schedule(Act::Blink, 0, Ticks(10)).ok();
        pool.schedule(Act::Timeout, 0, Ticks(20)).ok();
        pool.schedule(Act::Refresh, 0, Ticks(40)).ok();

        assert_eq!(ticks(&pool, &queue, 10).fired, 1);
        assert_eq!(queue.pop_front(), Some(Event::new(Act::Blink, 0)));
        assert_eq!(pool.pending(), 3);
        assert!(!pool.is_pending(Act::Blink, 0));

        assert_eq!(ticks(&pool, &queue, 10).fired, 1);
        assert_eq!(queue.pop_front(), Some(Event::new(Act::Timeout, 0)));

        // Reuse a recycled node while others are armed.
        assert_eq!(pool.schedule(Act::Blink, 1, Ticks(5)), Ok(Scheduled::Armed));
        assert_eq!(ticks(&pool, &queue, 5).fired, 1);
        assert_eq!(queue.pop_front(), Some(Event::new(Act::Blink, 1)));

        assert_eq!(ticks(&pool, &queue, 5).fired, 1);
        assert_eq!(queue.pop_front(), Some(Event::new(Act::Save, 0)));
        assert_eq!(ticks(&pool, &queue, 10).fired, 1);
        assert_eq!(queue.pop_front(), Some(Event::new(Act::Refresh, 0)));
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn test_no_aliasing() {
        let pool: TimerPool<Act, 4> = TimerPool::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();
        pool.schedule(Act::Save, 0, Ticks(3)).ok();
        pool.schedule(Act::Save, 1, Ticks(3)).ok();
        pool.schedule(Act::Blink, 0, Ticks(3)).ok();
        assert_eq!(pool.pending(), 3);
        assert_eq!(ticks(&pool, &queue, 3).fired, 3);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_debounce() {
        let pool: TimerPool<Act, 4> = TimerPool::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();
        pool.schedule(Act::Save, 0, Ticks(20)).ok();
        for _ in 0..5 {
            assert_eq!(ticks(&pool, &queue, 15).fired, 0);
            assert_eq!(pool.schedule(Act::Save, 0, Ticks(20)), Ok(Scheduled::Restarted));
        }
        assert_eq!(pool.pending(), 1);
        assert_eq!(ticks(&pool, &queue, 19).fired, 0);
        assert_eq!(ticks(&pool, &queue, 100).fired, 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_retry_on_full_queue() {
        let pool: TimerPool<Act, 4> = TimerPool::new();
        let queue: EventQueue<Act, 8> = EventQueue::new();
        for i in 0..8 {
            queue.push(Act::Refresh, i).ok();
        }
        pool.schedule(Act::Timeout, 0, Ticks(1)).ok();
        assert_eq!(ticks(&pool, &queue, 5), TickReport { fired: 0, retried: 5 });
        assert_eq!(pool.pending(), 1);

        queue.pop();
        assert_eq!(pool.tick(&queue), TickReport { fired: 1, retried: 0 });
        assert_eq!(pool.pending(), 0);
        assert_eq!(ticks(&pool, &queue, 5), TickReport::default());
    }
}

// vim: ts=4 sw=4 expandtab
