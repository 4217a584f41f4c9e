//! Interrupt safe event queue with time deferred events.
//!
//! Interrupt handlers produce events with [EventQueue::push]. The run loop
//! consumes them one at a time outside of interrupt context
//! ([Scheduler::run_once]).
//!
//! [DeferredTable::schedule] delays an event by a number of ticks of a
//! periodic timer interrupt that calls [DeferredTable::tick]. Scheduling the
//! same event again before it expired restarts the countdown. Expired
//! events that do not fit into the full event queue stay armed and are
//! retried on the next tick.
//!
//! All state is stored in fixed size arrays. Nothing is allocated.
//! Shared state is only accessed inside of [critical_section]s.

#![cfg_attr(not(test), no_std)]

pub mod deferred;
pub mod error;
pub mod event;
pub mod irq;
pub mod pool;
pub mod queue;
pub mod sched;

pub use crate::{
    deferred::{DeferredTable, Scheduled, TickReport, TimerStats},
    error::{PoolFull, QueueFull},
    event::{Action, Event, Ticks},
    irq::IrqGuard,
    pool::TimerPool,
    queue::{EventQueue, QueueStats},
    sched::Scheduler,
};

// vim: ts=4 sw=4 expandtab
