use std::{cell::RefCell, collections::HashSet, future::Future, rc::Rc, time::Duration};

use derive_ex::Ex;
use serde::{Deserialize, Serialize};
use slabmap::SlabMap;
use tokio::{
    task::spawn_local,
    time::{interval, MissedTickBehavior},
};

use crate::{
    ActionHash, AgentPubKey, AsyncValue, HoloHash, Readable, Subscription, SyncError, Timestamp,
};


#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreateLink {
    pub hash: ActionHash,
    pub author: AgentPubKey,
    pub base_address: HoloHash,
    pub target_address: HoloHash,
    pub tag: Vec<u8>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeleteLink {
    pub hash: ActionHash,
    pub author: AgentPubKey,
    pub base_address: HoloHash,
    /// Hash of the [`CreateLink`] this deletes.
    pub link_add_address: ActionHash,
    pub timestamp: Timestamp,
}

/// A link that has been deleted at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedLink {
    pub create_link: CreateLink,
    pub deletes: Vec<DeleteLink>,
}

/// Best-effort push notification about link changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LinkSignal {
    LinkCreated {
        link_type: String,
        action: CreateLink,
    },
    LinkDeleted {
        link_type: String,
        action: DeleteLink,
        create_link_action: CreateLink,
    },
}

impl LinkSignal {
    pub fn link_type(&self) -> &str {
        match self {
            LinkSignal::LinkCreated { link_type, .. }
            | LinkSignal::LinkDeleted { link_type, .. } => link_type,
        }
    }
    pub fn base_address(&self) -> &HoloHash {
        match self {
            LinkSignal::LinkCreated { action, .. } => &action.base_address,
            LinkSignal::LinkDeleted { action, .. } => &action.base_address,
        }
    }
}

/// Selects the push notifications relevant to one link set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFilter {
    pub link_type: String,
    /// `None` accepts links on any base.
    pub base: Option<HoloHash>,
}

impl LinkFilter {
    pub fn new(link_type: impl Into<String>) -> Self {
        Self {
            link_type: link_type.into(),
            base: None,
        }
    }
    pub fn with_base(mut self, base: HoloHash) -> Self {
        self.base = Some(base);
        self
    }

    /// Bases are compared in their normalized form, so an agent key matches the same key
    /// addressed as an entry.
    pub fn matches(&self, signal: &LinkSignal) -> bool {
        signal.link_type() == self.link_type
            && self
                .base
                .as_ref()
                .is_none_or(|base| base.normalized() == signal.base_address().normalized())
    }
}

/// An observer list for push notifications.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct SignalHub<S: 'static>(Rc<RefCell<SlabMap<Rc<dyn Fn(&S)>>>>);

impl<S: 'static> SignalHub<S> {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(SlabMap::new())))
    }

    pub fn subscribe(&self, f: impl Fn(&S) + 'static) -> Subscription {
        let key = self.0.borrow_mut().insert(Rc::new(f));
        let listeners = Rc::downgrade(&self.0);
        Subscription::from_fn(move || {
            if let Some(listeners) = listeners.upgrade() {
                let _removed = listeners.borrow_mut().remove(key);
            }
        })
    }

    pub fn emit(&self, signal: &S) {
        let listeners: Vec<_> = self.0.borrow().values().cloned().collect();
        for listener in listeners {
            listener(signal);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.0.borrow().len()
    }
}
impl<S: 'static> Default for SignalHub<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of links reconciled from full refetches and individual push notifications.
trait LinkSet: Clone + PartialEq + 'static {
    /// Merges duplicated identities.
    fn normalize(self) -> Self;

    /// Whether both sets contain the same identities, ignoring order.
    fn same_members(&self, other: &Self) -> bool;

    /// Applies a push notification. Returns `true` if the set changed.
    fn apply(&mut self, signal: &LinkSignal) -> bool;
}

impl LinkSet for Vec<CreateLink> {
    fn normalize(mut self) -> Self {
        let mut seen = HashSet::new();
        self.retain(|link| seen.insert(link.hash.clone()));
        self
    }
    fn same_members(&self, other: &Self) -> bool {
        let a: HashSet<_> = self.iter().map(|link| &link.hash).collect();
        let b: HashSet<_> = other.iter().map(|link| &link.hash).collect();
        a == b
    }
    fn apply(&mut self, signal: &LinkSignal) -> bool {
        match signal {
            LinkSignal::LinkCreated { action, .. } => {
                if self.iter().any(|link| link.hash == action.hash) {
                    return false;
                }
                self.push(action.clone());
                true
            }
            LinkSignal::LinkDeleted {
                create_link_action, ..
            } => {
                let len = self.len();
                self.retain(|link| link.hash != create_link_action.hash);
                self.len() != len
            }
        }
    }
}

impl LinkSet for Vec<DeletedLink> {
    fn normalize(self) -> Self {
        let mut out: Vec<DeletedLink> = Vec::with_capacity(self.len());
        for link in self {
            match out
                .iter_mut()
                .find(|l| l.create_link.hash == link.create_link.hash)
            {
                Some(existing) => {
                    for delete in link.deletes {
                        attach(existing, delete);
                    }
                }
                None => {
                    let mut entry = DeletedLink {
                        create_link: link.create_link,
                        deletes: Vec::new(),
                    };
                    for delete in link.deletes {
                        attach(&mut entry, delete);
                    }
                    out.push(entry);
                }
            }
        }
        out
    }
    fn same_members(&self, other: &Self) -> bool {
        fn identities(links: &[DeletedLink]) -> HashSet<(&ActionHash, &ActionHash)> {
            links
                .iter()
                .flat_map(|l| l.deletes.iter().map(move |d| (&l.create_link.hash, &d.hash)))
                .collect()
        }
        let a: HashSet<_> = self.iter().map(|l| &l.create_link.hash).collect();
        let b: HashSet<_> = other.iter().map(|l| &l.create_link.hash).collect();
        a == b && identities(self) == identities(other)
    }
    fn apply(&mut self, signal: &LinkSignal) -> bool {
        let LinkSignal::LinkDeleted {
            action,
            create_link_action,
            ..
        } = signal
        else {
            return false;
        };
        match self
            .iter_mut()
            .find(|l| l.create_link.hash == create_link_action.hash)
        {
            Some(existing) => attach(existing, action.clone()),
            None => {
                self.push(DeletedLink {
                    create_link: create_link_action.clone(),
                    deletes: vec![action.clone()],
                });
                true
            }
        }
    }
}

fn attach(link: &mut DeletedLink, delete: DeleteLink) -> bool {
    if link.deletes.iter().any(|d| d.hash == delete.hash) {
        return false;
    }
    link.deletes.push(delete);
    true
}

/// The links currently present: created and not deleted.
///
/// Polls `fetch` every `period` and applies matching [`LinkSignal`]s in between.
pub fn live_links_readable<F, Fut>(
    hub: &SignalHub<LinkSignal>,
    filter: LinkFilter,
    period: Duration,
    fetch: F,
) -> Readable<Vec<CreateLink>>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<Vec<CreateLink>, SyncError>> + 'static,
{
    link_set_readable(hub, filter, period, fetch)
}

/// The links that have been deleted, each with its deletions.
pub fn deleted_links_readable<F, Fut>(
    hub: &SignalHub<LinkSignal>,
    filter: LinkFilter,
    period: Duration,
    fetch: F,
) -> Readable<Vec<DeletedLink>>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<Vec<DeletedLink>, SyncError>> + 'static,
{
    link_set_readable(hub, filter, period, fetch)
}

struct LinkState<L> {
    /// `None` until the first successful poll.
    current: Option<L>,
    /// Signals received before the first successful poll.
    buffered: Vec<LinkSignal>,
    errored: bool,
}

fn link_set_readable<L, F, Fut>(
    hub: &SignalHub<LinkSignal>,
    filter: LinkFilter,
    period: Duration,
    fetch: F,
) -> Readable<L>
where
    L: LinkSet,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<L, SyncError>> + 'static,
{
    let hub = hub.clone();
    let fetch = Rc::new(fetch);
    let filter = Rc::new(filter);
    Readable::new(move |set| {
        let state = Rc::new(RefCell::new(LinkState::<L> {
            current: None,
            buffered: Vec::new(),
            errored: false,
        }));
        let push = hub.subscribe({
            let state = state.clone();
            let filter = filter.clone();
            let set = set.clone();
            move |signal| {
                if !filter.matches(signal) {
                    return;
                }
                let changed = {
                    let mut s = state.borrow_mut();
                    let s = &mut *s;
                    match &mut s.current {
                        Some(links) => links.apply(signal).then(|| links.clone()),
                        None => {
                            s.buffered.push(signal.clone());
                            None
                        }
                    }
                };
                if let Some(links) = changed {
                    tracing::debug!(
                        link_type = filter.link_type.as_str(),
                        "link set changed by signal"
                    );
                    set.set(AsyncValue::Complete(links));
                }
            }
        });

        tracing::debug!(link_type = filter.link_type.as_str(), "link set started");
        let fetch = fetch.clone();
        let filter = filter.clone();
        let task = spawn_local(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tracing::trace!(link_type = filter.link_type.as_str(), "poll tick");
                let result = fetch().await;
                let value = {
                    let mut s = state.borrow_mut();
                    reconcile(&mut s, result)
                };
                if let Some(value) = value {
                    if let AsyncValue::Error(e) = &value {
                        tracing::warn!(
                            link_type = filter.link_type.as_str(),
                            error = %e,
                            "fetch failed"
                        );
                    }
                    set.set_dedup(value);
                }
            }
        });
        Subscription::from_task(task).merge(push)
    })
}

fn reconcile<L: LinkSet>(
    state: &mut LinkState<L>,
    result: Result<L, SyncError>,
) -> Option<AsyncValue<L>> {
    let fetched = match result {
        Ok(links) => links.normalize(),
        Err(e) => {
            state.errored = true;
            return Some(AsyncValue::Error(e));
        }
    };
    let errored = std::mem::replace(&mut state.errored, false);
    if state.current.is_none() {
        let mut links = fetched;
        for signal in state.buffered.drain(..) {
            links.apply(&signal);
        }
        state.current = Some(links.clone());
        return Some(AsyncValue::Complete(links));
    }
    let unchanged = state
        .current
        .as_ref()
        .is_some_and(|current| current.same_members(&fetched));
    if unchanged && !errored {
        return None;
    }
    state.current = Some(fetched.clone());
    Some(AsyncValue::Complete(fetched))
}
