#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::HashMap,
    future::Future,
    rc::Rc,
    time::Duration,
};

use futures::future::LocalBoxFuture;
use gather_sync::{
    ActionHash, AgentPubKey, CallToAction, Commitment, CreateLink, DeleteLink, DeletedLink,
    EntryRecord, Event, EventTime, GatherStore, HoloHash, LinkSignal, Proposal, RemoteClient,
    RuntimeClock, SignalHub, SyncConfig, SyncError, Timestamp,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::task::LocalSet;

pub const T0: Timestamp = 1_700_000_000_000_000;
pub const PERIOD: Duration = Duration::from_millis(100);

pub fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
pub fn micros(ms: i64) -> Timestamp {
    ms * 1000
}

pub async fn run<F: Future>(f: F) -> F::Output {
    LocalSet::new().run_until(f).await
}

pub fn me() -> HoloHash {
    HoloHash::agent("me")
}

#[derive(Default)]
struct State {
    events: HashMap<ActionHash, EntryRecord<Event>>,
    proposals: HashMap<ActionHash, EntryRecord<Proposal>>,
    call_to_actions: HashMap<ActionHash, EntryRecord<CallToAction>>,
    assemblies: HashMap<ActionHash, Vec<ActionHash>>,
    commitments: HashMap<ActionHash, Vec<EntryRecord<Commitment>>>,
    cancellations: HashMap<ActionHash, Vec<ActionHash>>,
    proposal_events: HashMap<ActionHash, Vec<CreateLink>>,
    /// Link sets answered by the collection methods, keyed by link type.
    collections: HashMap<&'static str, Vec<CreateLink>>,
    unread_alerts: Vec<CreateLink>,
    read_alerts: Vec<DeletedLink>,
    calls: HashMap<String, usize>,
    failures: HashMap<String, usize>,
    next_id: usize,
}

/// In-memory backend answering the calls of `GatherClient`.
#[derive(Default)]
pub struct MockBackend {
    state: RefCell<State>,
    hub: SignalHub<LinkSignal>,
}

impl MockBackend {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn hub(&self) -> SignalHub<LinkSignal> {
        self.hub.clone()
    }

    pub fn store(self: &Rc<Self>) -> GatherStore {
        let config = SyncConfig::default()
            .with_poll_interval(PERIOD)
            .with_clock_tick(PERIOD);
        GatherStore::new(
            self.clone(),
            self.hub(),
            me(),
            config,
            Rc::new(RuntimeClock::starting_at(T0)),
        )
        .unwrap()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state.borrow().calls.get(method).copied().unwrap_or(0)
    }

    /// The next `count` calls of `method` fail.
    pub fn fail_next(&self, method: &str, count: usize) {
        self.state
            .borrow_mut()
            .failures
            .insert(method.to_string(), count);
    }

    pub fn add_event(
        &self,
        name: &str,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> ActionHash {
        let hash = HoloHash::action(name);
        let record = EntryRecord {
            action_hash: hash.clone(),
            author: me(),
            timestamp: T0,
            entry: Event {
                hosts: vec![me()],
                title: name.to_string(),
                description: String::new(),
                location: "hall".into(),
                time: EventTime::Unique {
                    start_time,
                    end_time,
                },
                cost: None,
                call_to_action_hash: HoloHash::action(format!("cta-{name}")),
                from_proposal: None,
            },
        };
        self.state.borrow_mut().events.insert(hash.clone(), record);
        hash
    }

    pub fn add_proposal(&self, name: &str, expiration_time: Option<Timestamp>) -> ActionHash {
        let hash = HoloHash::action(name);
        let cta_hash = HoloHash::action(format!("cta-{name}"));
        let mut s = self.state.borrow_mut();
        s.proposals.insert(
            hash.clone(),
            EntryRecord {
                action_hash: hash.clone(),
                author: me(),
                timestamp: T0,
                entry: Proposal {
                    hosts: vec![me()],
                    title: name.to_string(),
                    description: String::new(),
                    location: None,
                    time: None,
                    cost: None,
                    call_to_action_hash: cta_hash.clone(),
                },
            },
        );
        s.call_to_actions.insert(
            cta_hash.clone(),
            EntryRecord {
                action_hash: cta_hash,
                author: me(),
                timestamp: T0,
                entry: CallToAction { expiration_time },
            },
        );
        hash
    }

    pub fn add_assembly(&self, proposal: &str, assembly: &str) {
        let cta_hash = HoloHash::action(format!("cta-{proposal}"));
        self.state
            .borrow_mut()
            .assemblies
            .entry(cta_hash)
            .or_default()
            .push(HoloHash::action(assembly));
    }

    pub fn cancel(&self, hash: &ActionHash) {
        let id = self.next_id();
        self.state
            .borrow_mut()
            .cancellations
            .entry(hash.clone())
            .or_default()
            .push(HoloHash::action(format!("cancellation-{id}")));
    }

    /// Removes every cancellation of `hash`.
    pub fn uncancel(&self, hash: &ActionHash) {
        self.state.borrow_mut().cancellations.remove(hash);
    }

    /// Records a commitment of `author` to the call to action of `entity`.
    pub fn add_commitment(
        &self,
        entity: &str,
        author: &AgentPubKey,
        need_index: u32,
    ) -> ActionHash {
        let id = self.next_id();
        let hash = HoloHash::action(format!("commitment-{id}"));
        let cta_hash = HoloHash::action(format!("cta-{entity}"));
        let record = EntryRecord {
            action_hash: hash.clone(),
            author: author.clone(),
            timestamp: T0,
            entry: Commitment {
                call_to_action_hash: cta_hash.clone(),
                need_index,
                amount: 1,
                comment: String::new(),
            },
        };
        self.state
            .borrow_mut()
            .commitments
            .entry(cta_hash)
            .or_default()
            .push(record);
        hash
    }

    /// Adds a link to a collection without notifying.
    pub fn link(
        &self,
        link_type: &'static str,
        base: &HoloHash,
        target: &ActionHash,
    ) -> CreateLink {
        let link = self.new_link(base, target, Vec::new());
        self.state
            .borrow_mut()
            .collections
            .entry(link_type)
            .or_default()
            .push(link.clone());
        link
    }

    /// Adds a link to a collection and pushes the matching signal.
    pub fn push_link(&self, link_type: &'static str, base: &HoloHash, target: &ActionHash) {
        let link = self.link(link_type, base, target);
        self.hub.emit(&LinkSignal::LinkCreated {
            link_type: link_type.into(),
            action: link,
        });
    }

    pub fn add_proposal_event(&self, proposal: &ActionHash, event: &ActionHash) {
        let link = self.new_link(proposal, event, Vec::new());
        self.state
            .borrow_mut()
            .proposal_events
            .entry(proposal.clone())
            .or_default()
            .push(link);
    }

    pub fn unlink(&self, link_type: &'static str, target: &ActionHash) -> Option<CreateLink> {
        let mut s = self.state.borrow_mut();
        let links = s.collections.entry(link_type).or_default();
        let index = links.iter().position(|l| &l.target_address == target)?;
        Some(links.remove(index))
    }

    /// Adds an unread alert and pushes the matching signal.
    pub fn notify_alert(&self, alert: Value, timestamp: Timestamp) -> CreateLink {
        let tag = alert.to_string().into_bytes();
        let mut link = self.new_link(&me(), &HoloHash::action("alert"), tag);
        link.timestamp = timestamp;
        self.state.borrow_mut().unread_alerts.push(link.clone());
        self.hub.emit(&LinkSignal::LinkCreated {
            link_type: "MyAlerts".into(),
            action: link.clone(),
        });
        link
    }

    fn next_id(&self) -> usize {
        let mut s = self.state.borrow_mut();
        s.next_id += 1;
        s.next_id
    }

    fn new_link(&self, base: &HoloHash, target: &ActionHash, tag: Vec<u8>) -> CreateLink {
        let id = self.next_id();
        CreateLink {
            hash: HoloHash::action(format!("link-{id}")),
            author: me(),
            base_address: base.clone(),
            target_address: target.clone(),
            tag,
            timestamp: T0,
        }
    }

    fn move_link(&self, from: &[&'static str], to: &'static str, target: &ActionHash) {
        if from.iter().any(|&from| self.unlink(from, target).is_some()) {
            self.link(to, &HoloHash::entry(to), target);
        }
    }

    fn answer_move(
        &self,
        payload: Value,
        from: &[&'static str],
        to: &'static str,
    ) -> Result<Value, SyncError> {
        let hash: ActionHash = decode(payload)?;
        self.move_link(from, to, &hash);
        Ok(Value::Null)
    }

    fn answer(&self, method: &str, payload: Value) -> Result<Value, SyncError> {
        {
            let mut s = self.state.borrow_mut();
            *s.calls.entry(method.to_string()).or_default() += 1;
            if let Some(left) = s.failures.get_mut(method) {
                if *left > 0 {
                    *left -= 1;
                    return Err(SyncError::remote(method, "unavailable"));
                }
            }
        }
        let collection = |link_type: &str| {
            let s = self.state.borrow();
            Ok(json!(s.collections.get(link_type).cloned().unwrap_or_default()))
        };
        match method {
            "get_latest_event" => {
                let hash: ActionHash = decode(payload)?;
                Ok(json!(self.state.borrow().events.get(&hash)))
            }
            "get_latest_proposal" => {
                let hash: ActionHash = decode(payload)?;
                Ok(json!(self.state.borrow().proposals.get(&hash)))
            }
            "get_latest_call_to_action" => {
                let hash: ActionHash = decode(payload)?;
                Ok(json!(self.state.borrow().call_to_actions.get(&hash)))
            }
            "get_cancellations_for" => {
                let hash: ActionHash = decode(payload)?;
                let s = self.state.borrow();
                Ok(json!(s.cancellations.get(&hash).cloned().unwrap_or_default()))
            }
            "get_assemblies_for_call_to_action" => {
                let hash: ActionHash = decode(payload)?;
                let s = self.state.borrow();
                Ok(json!(s.assemblies.get(&hash).cloned().unwrap_or_default()))
            }
            "get_events_for_proposal" => {
                let hash: ActionHash = decode(payload)?;
                let s = self.state.borrow();
                Ok(json!(s.proposal_events.get(&hash).cloned().unwrap_or_default()))
            }
            "get_all_upcoming_events" => collection("UpcomingEvents"),
            "get_all_past_events" => collection("PastEvents"),
            "get_all_cancelled_events" => collection("CancelledEvents"),
            "get_all_open_proposals" => collection("OpenProposals"),
            "get_all_expired_proposals" => collection("ExpiredProposals"),
            "get_all_cancelled_proposals" => collection("CancelledProposals"),
            "get_my_events" => collection("MyEvents"),
            "get_commitments_for_call_to_action" => {
                let hash: ActionHash = decode(payload)?;
                let s = self.state.borrow();
                Ok(json!(s.commitments.get(&hash).cloned().unwrap_or_default()))
            }
            "mark_event_past" => self.answer_move(payload, &["UpcomingEvents"], "PastEvents"),
            "mark_proposal_as_expired" => {
                self.answer_move(payload, &["OpenProposals"], "ExpiredProposals")
            }
            "mark_event_as_cancelled" => {
                self.answer_move(payload, &["UpcomingEvents", "PastEvents"], "CancelledEvents")
            }
            "mark_proposal_as_cancelled" => self.answer_move(
                payload,
                &["OpenProposals", "ExpiredProposals"],
                "CancelledProposals",
            ),
            "mark_event_as_upcoming" => {
                self.answer_move(payload, &["CancelledEvents"], "UpcomingEvents")
            }
            "mark_proposal_as_open" => {
                self.answer_move(payload, &["CancelledProposals"], "OpenProposals")
            }
            "create_cancellation" => {
                let cancelled: ActionHash = decode(payload["cancelled_hash"].clone())?;
                self.cancel(&cancelled);
                Ok(json!(HoloHash::action("cancellation")))
            }
            "get_unread_alerts" => Ok(json!(self.state.borrow().unread_alerts)),
            "get_read_alerts" => Ok(json!(self.state.borrow().read_alerts)),
            "mark_alerts_as_read" => {
                let hashes: Vec<ActionHash> = decode(payload)?;
                for hash in hashes {
                    self.mark_read(&hash);
                }
                Ok(Value::Null)
            }
            _ => Err(SyncError::remote(method, "unknown method")),
        }
    }

    fn mark_read(&self, hash: &ActionHash) {
        let id = self.next_id();
        let signal = {
            let mut s = self.state.borrow_mut();
            let Some(index) = s.unread_alerts.iter().position(|l| &l.hash == hash) else {
                return;
            };
            let link = s.unread_alerts.remove(index);
            let delete = DeleteLink {
                hash: HoloHash::action(format!("delete-{id}")),
                author: me(),
                base_address: link.base_address.clone(),
                link_add_address: link.hash.clone(),
                timestamp: T0,
            };
            s.read_alerts.push(DeletedLink {
                create_link: link.clone(),
                deletes: vec![delete.clone()],
            });
            LinkSignal::LinkDeleted {
                link_type: "MyAlerts".into(),
                action: delete,
                create_link_action: link,
            }
        };
        self.hub.emit(&signal);
    }
}

impl RemoteClient for MockBackend {
    fn call(
        &self,
        method: &str,
        payload: Value,
    ) -> LocalBoxFuture<'static, Result<Value, SyncError>> {
        let result = self.answer(method, payload);
        Box::pin(futures::future::ready(result))
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, SyncError> {
    serde_json::from_value(payload).map_err(|e| SyncError::Decode {
        method: "mock".into(),
        message: e.to_string(),
    })
}
