use std::{
    rc::Rc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::{poll_readable, Readable, Timestamp};


pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time measured with the tokio clock.
///
/// The wall-clock time is read once, at construction. Later readings add the time elapsed on
/// [`tokio::time::Instant`], so they follow the runtime when time is paused or advanced.
#[derive(Debug, Clone)]
pub struct RuntimeClock {
    anchor: Timestamp,
    start: tokio::time::Instant,
}

impl RuntimeClock {
    pub fn new() -> Self {
        let anchor = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_micros() as Timestamp);
        Self::starting_at(anchor)
    }
    pub fn starting_at(anchor: Timestamp) -> Self {
        Self {
            anchor,
            start: tokio::time::Instant::now(),
        }
    }
}
impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now(&self) -> Timestamp {
        self.anchor + self.start.elapsed().as_micros() as Timestamp
    }
}

/// A readable emitting the current time every `period`.
pub fn clock_ticker(clock: Rc<dyn Clock>, period: Duration) -> Readable<Timestamp> {
    poll_readable("clock", period, move || {
        futures::future::ready(Ok(clock.now()))
    })
}
