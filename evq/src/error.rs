use derive_more::Display;

/// The [EventQueue](crate::EventQueue) had no free slot. The event was dropped.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[display("event queue full")]
pub struct QueueFull;

impl core::error::Error for QueueFull {}

/// The [TimerPool](crate::TimerPool) had no free node. Nothing was scheduled.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[display("timer pool full")]
pub struct PoolFull;

impl core::error::Error for PoolFull {}

// vim: ts=4 sw=4 expandtab
