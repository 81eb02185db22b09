//! Lock-free statistic aggregators
//!
//! Two building blocks back every number this crate reports:
//!
//! - [`CounterStatistic`] tracks a gauge (`current`), the running total of
//!   increments and the high-water mark of `current`.
//! - [`SampleStatistic`] folds samples into count/total/max/mean/std-dev
//!   without storing the sample sequence.
//!
//! Both are safe to update from any number of threads. Neither takes a lock
//! on the update path.

mod counter;
mod sample;

pub use counter::CounterStatistic;
pub use sample::{SampleStatistic, SampleSummary};
