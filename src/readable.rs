use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use futures::StreamExt;
use slabmap::SlabMap;

use crate::{AsyncValue, Subscription, SyncError};


type Sink<T> = Rc<dyn Fn(&AsyncValue<T>)>;
type Start<T> = Box<dyn Fn(Setter<T>) -> Subscription>;

/// A subscribable [`AsyncValue`] stream.
///
/// The stream is started when the first subscriber arrives and stopped when the last one leaves.
/// Stopping drops the [`Subscription`] returned by the start function and resets the value to
/// [`AsyncValue::Pending`], so a later subscriber starts again from scratch.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct Readable<T: 'static>(Rc<ReadableNode<T>>);

impl<T: Clone + 'static> Readable<T> {
    /// Create a readable from a start function.
    ///
    /// `start` is called each time the subscriber count goes from zero to one.
    /// The returned [`Subscription`] is dropped when the count goes back to zero.
    pub fn new(start: impl Fn(Setter<T>) -> Subscription + 'static) -> Self {
        Self(Rc::new(ReadableNode {
            start: Box::new(start),
            state: RefCell::new(NodeState {
                value: AsyncValue::Pending,
                sinks: SlabMap::new(),
                running: None,
                epoch: 0,
                active: false,
            }),
        }))
    }

    pub fn from_value(value: T) -> Self {
        Self::from_async_value(AsyncValue::Complete(value))
    }
    pub fn from_error(e: SyncError) -> Self {
        Self::from_async_value(AsyncValue::Error(e))
    }
    pub fn pending() -> Self {
        Self::from_async_value(AsyncValue::Pending)
    }
    pub fn from_async_value(value: AsyncValue<T>) -> Self {
        Self::new(move |set| {
            set.set(value.clone());
            Subscription::empty()
        })
    }

    /// Registers `f` and calls it once with the current value, then again on every emission.
    ///
    /// The returned [`Subscription`] keeps the readable alive.
    pub fn subscribe(&self, f: impl Fn(&AsyncValue<T>) + 'static) -> Subscription {
        let node = &self.0;
        if node.state.borrow().sinks.is_empty() {
            node.start();
        }
        let sink: Sink<T> = Rc::new(f);
        let (key, value) = {
            let mut s = node.state.borrow_mut();
            (s.sinks.insert(sink.clone()), s.value.clone())
        };
        sink(&value);
        let node = node.clone();
        Subscription::from_fn(move || node.unsubscribe(key))
    }

    /// Current value without subscribing. `Pending` while the stream is stopped.
    pub fn get(&self) -> AsyncValue<T> {
        self.0.state.borrow().value.clone()
    }

    /// Waits for the first value that is not pending.
    pub async fn settled(&self) -> Result<T, SyncError> {
        let (tx, mut rx) = futures::channel::mpsc::unbounded();
        let _s = self.subscribe(move |value| {
            if !value.is_pending() {
                let _ = tx.unbounded_send(value.clone());
            }
        });
        rx.next()
            .await
            .and_then(AsyncValue::into_result)
            .unwrap_or(Err(SyncError::Closed))
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.state.borrow().sinks.len()
    }
    pub fn is_running(&self) -> bool {
        self.0.state.borrow().active
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Waits for the first settled value of `readable`.
pub async fn to_future<T: Clone + 'static>(readable: &Readable<T>) -> Result<T, SyncError> {
    readable.settled().await
}

struct ReadableNode<T: 'static> {
    start: Start<T>,
    state: RefCell<NodeState<T>>,
}

struct NodeState<T: 'static> {
    value: AsyncValue<T>,
    sinks: SlabMap<Sink<T>>,
    running: Option<Subscription>,
    epoch: u64,
    active: bool,
}
impl<T> NodeState<T> {
    fn is_live(&self, epoch: u64) -> bool {
        self.active && self.epoch == epoch
    }
}

impl<T: Clone + 'static> ReadableNode<T> {
    fn start(self: &Rc<Self>) {
        let epoch = {
            let mut s = self.state.borrow_mut();
            s.epoch += 1;
            s.active = true;
            s.epoch
        };
        let running = (self.start)(Setter {
            node: Rc::downgrade(self),
            epoch,
        });
        let mut s = self.state.borrow_mut();
        if s.is_live(epoch) {
            s.running = Some(running);
        } else {
            drop(s);
            drop(running);
        }
    }

    fn unsubscribe(&self, key: usize) {
        let (_sink, running, _value) = {
            let mut s = self.state.borrow_mut();
            let sink = s.sinks.remove(key);
            if !s.sinks.is_empty() {
                (sink, None, AsyncValue::Pending)
            } else {
                s.active = false;
                s.epoch += 1;
                let value = std::mem::take(&mut s.value);
                (sink, s.running.take(), value)
            }
        };
        drop(running);
    }
}

/// Write handle passed to a readable's start function.
///
/// Values written after the readable was stopped are discarded, even if the readable has been
/// started again since.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct Setter<T: 'static> {
    node: Weak<ReadableNode<T>>,
    epoch: u64,
}

impl<T: Clone + 'static> Setter<T> {
    /// Stores `value` and notifies every subscriber.
    pub fn set(&self, value: AsyncValue<T>) {
        self.apply(value, |_, _| true)
    }

    /// Stores `value` and notifies subscribers only if it differs from the current value.
    pub fn set_dedup(&self, value: AsyncValue<T>)
    where
        T: PartialEq,
    {
        self.apply(value, |old, new| old != new)
    }

    /// Returns `false` once the readable this setter was created for has been stopped.
    pub fn is_live(&self) -> bool {
        self.node
            .upgrade()
            .is_some_and(|node| node.state.borrow().is_live(self.epoch))
    }

    /// Wraps this setter so that it ignores everything after the first error.
    pub fn latching(self) -> LatchingSetter<T> {
        LatchingSetter {
            setter: self,
            latched: Cell::new(false),
        }
    }

    fn apply(
        &self,
        value: AsyncValue<T>,
        changed: impl FnOnce(&AsyncValue<T>, &AsyncValue<T>) -> bool,
    ) {
        let Some(node) = self.node.upgrade() else {
            return;
        };
        let (sinks, _old) = {
            let mut s = node.state.borrow_mut();
            if !s.is_live(self.epoch) || !changed(&s.value, &value) {
                return;
            }
            let old = std::mem::replace(&mut s.value, value.clone());
            let sinks: Vec<Sink<T>> = s.sinks.values().cloned().collect();
            (sinks, old)
        };
        for sink in sinks {
            sink(&value);
        }
    }
}

/// A [`Setter`] that stays on the first error it was given.
///
/// Used by combinators: once an input has failed, the derived readable keeps reporting that
/// error until it is stopped and started again.
pub struct LatchingSetter<T: 'static> {
    setter: Setter<T>,
    latched: Cell<bool>,
}

impl<T: Clone + 'static> LatchingSetter<T> {
    pub fn set(&self, value: AsyncValue<T>) {
        if self.latched.get() {
            return;
        }
        if value.is_error() {
            self.latched.set(true);
        }
        self.setter.set(value);
    }
    pub fn is_latched(&self) -> bool {
        self.latched.get()
    }
}
