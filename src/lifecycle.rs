use std::{cell::RefCell, collections::HashSet, rc::Rc};

use futures::{
    channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender},
    future::LocalBoxFuture,
    StreamExt,
};
use parse_display::Display;
use tokio::task::spawn_local;

use crate::{ActionHash, AsyncValue, GatherClient, Readable, Subscription, SyncError, Timestamp};


/// A backend call that moves an entity to its next lifecycle stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum Advance {
    #[display("mark_event_past({0})")]
    MarkEventPast(ActionHash),
    #[display("mark_proposal_as_expired({0})")]
    MarkProposalExpired(ActionHash),
    #[display("mark_event_as_cancelled({0})")]
    MarkEventCancelled(ActionHash),
    #[display("mark_proposal_as_cancelled({0})")]
    MarkProposalCancelled(ActionHash),
    /// Undoes a cancellation.
    #[display("mark_event_as_upcoming({0})")]
    MarkEventUpcoming(ActionHash),
    /// Undoes a cancellation.
    #[display("mark_proposal_as_open({0})")]
    MarkProposalOpen(ActionHash),
}

/// Performs [`Advance`] requests.
pub trait Advancer {
    fn advance(&self, advance: &Advance) -> LocalBoxFuture<'static, Result<(), SyncError>>;
}

impl Advancer for GatherClient {
    fn advance(&self, advance: &Advance) -> LocalBoxFuture<'static, Result<(), SyncError>> {
        let client = self.clone();
        let advance = advance.clone();
        Box::pin(async move {
            match &advance {
                Advance::MarkEventPast(hash) => client.mark_event_past(hash).await,
                Advance::MarkProposalExpired(hash) => client.mark_proposal_as_expired(hash).await,
                Advance::MarkEventCancelled(hash) => client.mark_event_as_cancelled(hash).await,
                Advance::MarkProposalCancelled(hash) => {
                    client.mark_proposal_as_cancelled(hash).await
                }
                Advance::MarkEventUpcoming(hash) => client.mark_event_as_upcoming(hash).await,
                Advance::MarkProposalOpen(hash) => client.mark_proposal_as_open(hash).await,
            }
        })
    }
}

/// Advance requests waiting for the worker.
///
/// A request is accepted once per queue: it is refused while in flight and after it
/// succeeded. A failed request is forgotten, so it can be issued again.
#[derive(Clone)]
pub struct EffectQueue {
    tx: UnboundedSender<Advance>,
    issued: Rc<RefCell<HashSet<Advance>>>,
}

pub type EffectReceiver = UnboundedReceiver<Advance>;

impl EffectQueue {
    pub fn new() -> (Self, EffectReceiver) {
        let (tx, rx) = unbounded();
        let queue = Self {
            tx,
            issued: Rc::new(RefCell::new(HashSet::new())),
        };
        (queue, rx)
    }

    /// Returns `true` if the request was queued.
    pub fn request(&self, advance: Advance) -> bool {
        if !self.issued.borrow_mut().insert(advance.clone()) {
            return false;
        }
        tracing::debug!(%advance, "advance requested");
        if self.tx.unbounded_send(advance.clone()).is_err() {
            self.issued.borrow_mut().remove(&advance);
            return false;
        }
        true
    }

    pub fn forget(&self, advance: &Advance) {
        self.issued.borrow_mut().remove(advance);
    }

    pub fn is_issued(&self, advance: &Advance) -> bool {
        self.issued.borrow().contains(advance)
    }
}

/// Drains `rx`, performing each request without waiting for the previous ones.
pub fn spawn_advance_worker(
    queue: EffectQueue,
    mut rx: EffectReceiver,
    advancer: Rc<dyn Advancer>,
) -> Subscription {
    Subscription::from_task(spawn_local(async move {
        while let Some(advance) = rx.next().await {
            let call = advancer.advance(&advance);
            let queue = queue.clone();
            spawn_local(async move {
                match call.await {
                    Ok(()) => tracing::debug!(%advance, "advance succeeded"),
                    Err(e) => {
                        tracing::warn!(%advance, error = %e, "advance failed");
                        queue.forget(&advance);
                    }
                }
            });
        }
    }))
}

/// Issues advances for the values of a readable.
#[derive(Clone)]
pub struct LifecycleTrigger {
    queue: EffectQueue,
    ticker: Readable<Timestamp>,
}

impl LifecycleTrigger {
    pub fn new(queue: EffectQueue, ticker: Readable<Timestamp>) -> Self {
        Self { queue, ticker }
    }

    /// Forwards `readable` unchanged.
    ///
    /// `detect` runs on every completed value and again on every clock tick, and the advances
    /// it returns are queued. A request whose call failed is sent again by the next run that
    /// still detects it. An advance that is no longer detected, because its entity left the
    /// observed value, is forgotten by the queue.
    pub fn observe<T: Clone + 'static>(
        &self,
        readable: &Readable<T>,
        detect: impl Fn(&T) -> Vec<Advance> + 'static,
    ) -> Readable<T> {
        let source = readable.clone();
        let ticker = self.ticker.clone();
        let queue = self.queue.clone();
        let detect = Rc::new(detect);
        Readable::new(move |set| {
            let observation = Rc::new(Observation {
                queue: queue.clone(),
                last: RefCell::new(None),
                detected: RefCell::new(HashSet::new()),
            });
            let tick = ticker.subscribe({
                let observation = observation.clone();
                let detect = detect.clone();
                move |now| {
                    if !now.is_complete() {
                        return;
                    }
                    let advances = observation.last.borrow().as_ref().map(|value| detect(value));
                    if let Some(advances) = advances {
                        observation.update(advances);
                    }
                }
            });
            let values = source.subscribe({
                let observation = observation.clone();
                let detect = detect.clone();
                move |value| {
                    if let AsyncValue::Complete(v) = value {
                        *observation.last.borrow_mut() = Some(v.clone());
                        observation.update(detect(v));
                    }
                    set.set(value.clone());
                }
            });
            values
                .merge(tick)
                .merge(Subscription::from_fn(move || observation.update(Vec::new())))
        })
    }
}

struct Observation<T> {
    queue: EffectQueue,
    last: RefCell<Option<T>>,
    detected: RefCell<HashSet<Advance>>,
}

impl<T> Observation<T> {
    fn update(&self, advances: Vec<Advance>) {
        let detected: HashSet<Advance> = advances.into_iter().collect();
        let previous = self.detected.replace(detected.clone());
        for advance in previous.difference(&detected) {
            self.queue.forget(advance);
        }
        for advance in detected {
            self.queue.request(advance);
        }
    }
}
