use std::mem::take;

use tokio::task::JoinHandle;


/// Handle returned by `subscribe`.
///
/// Dropping it unsubscribes.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(f)))
    }

    /// Aborts the task when dropped.
    pub fn from_task(handle: JoinHandle<()>) -> Self {
        Subscription(RawSubscription::Task(handle))
    }

    /// Drops the subscriptions in order when dropped.
    pub fn from_vec(subscriptions: Vec<Subscription>) -> Self {
        Subscription(RawSubscription::Many(subscriptions))
    }

    pub fn merge(self, other: Subscription) -> Self {
        if self.is_empty() {
            other
        } else {
            Subscription::from_vec(vec![self, other])
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.0, RawSubscription::Empty)
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
            RawSubscription::Task(handle) => handle.abort(),
            RawSubscription::Many(subscriptions) => drop(subscriptions),
        }
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + 'static>),
    Task(JoinHandle<()>),
    Many(Vec<Subscription>),
}
