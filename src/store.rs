use std::{cmp::Reverse, collections::HashSet, future::Future, rc::Rc, time::Duration};

use crate::{
    clock_ticker, derive_event_status, derive_proposal_status, join2, join3, join_all_filtered,
    live_links_readable, participants, poll_readable, spawn_advance_worker, ActionHash, Advance,
    AgentPubKey, Aggregation, Alert, AlertsWithStatus, CallToAction, Clock, Commitment,
    CreateLink, EffectQueue, EntryRecord, Event, EventStatus, EventWithStatus, GatherAlert,
    GatherClient, IndexedHash, KeyedCache, LifecycleTrigger, LinkFilter, LinkSignal,
    Participant, Proposal, ProposalStatus, ProposalWithStatus, Readable, RemoteClient, SignalHub,
    Subscription, SyncConfig, SyncError, Timestamp,
};

pub type RecordCache<T> = KeyedCache<ActionHash, Readable<EntryRecord<T>>>;
pub type RecordsCache<T> = KeyedCache<ActionHash, Readable<Vec<EntryRecord<T>>>>;
pub type HashesCache = KeyedCache<ActionHash, Readable<Vec<ActionHash>>>;

/// Reactive view of events and proposals.
///
/// Every readable handed out by the store is shared: observers of the same entity or
/// collection share one fetch loop.
pub struct GatherStore {
    pub client: GatherClient,
    my_pub_key: AgentPubKey,
    ticker: Readable<Timestamp>,
    queue: EffectQueue,

    /// Latest revision of each event.
    pub events: RecordCache<Event>,
    pub event_cancellations: HashesCache,
    pub event_status: KeyedCache<ActionHash, Readable<EventWithStatus>>,

    /// Latest revision of each proposal.
    pub proposals: RecordCache<Proposal>,
    pub proposal_cancellations: HashesCache,
    /// Events created from each proposal.
    pub proposal_events: KeyedCache<ActionHash, Readable<Vec<CreateLink>>>,
    pub proposal_status: KeyedCache<ActionHash, Readable<ProposalWithStatus>>,

    pub call_to_actions: RecordCache<CallToAction>,
    pub assemblies_for_call_to_action: HashesCache,
    pub commitments_for_call_to_action: RecordsCache<Commitment>,
    /// Agents committed to attend, derived from the commitments to need 0.
    pub participants_for_call_to_action: KeyedCache<ActionHash, Readable<Vec<Participant>>>,

    all_upcoming_events: Readable<Vec<IndexedHash>>,
    all_past_events: Readable<Vec<IndexedHash>>,
    all_cancelled_events: Readable<Vec<IndexedHash>>,
    all_open_proposals: Readable<Vec<IndexedHash>>,
    all_expired_proposals: Readable<Vec<IndexedHash>>,
    all_cancelled_proposals: Readable<Vec<IndexedHash>>,
    my_events: Readable<Vec<ActionHash>>,

    _worker: Subscription,
}

impl GatherStore {
    /// Builds the store and starts its advance worker.
    ///
    /// # Panics
    ///
    /// Panics if called outside a [`LocalSet`](tokio::task::LocalSet), since the worker is
    /// spawned with [`spawn_local`](tokio::task::spawn_local).
    pub fn new(
        remote: Rc<dyn RemoteClient>,
        hub: SignalHub<LinkSignal>,
        my_pub_key: AgentPubKey,
        config: SyncConfig,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let period = config.poll_interval();
        let client = GatherClient::new(remote);
        let ticker = clock_ticker(clock, config.clock_tick());
        let (queue, rx) = EffectQueue::new();
        let worker = spawn_advance_worker(queue.clone(), rx, Rc::new(client.clone()));
        let trigger = LifecycleTrigger::new(queue.clone(), ticker.clone());

        let events = keyed_poll("event", period, &client, |client, hash| async move {
            client.get_latest_event(&hash).await
        });
        let event_cancellations =
            keyed_poll("event_cancellations", period, &client, |client, hash| async move {
                client.get_cancellations_for(&hash).await
            });
        let event_status = {
            let events = events.clone();
            let cancellations = event_cancellations.clone();
            let ticker = ticker.clone();
            KeyedCache::new(move |hash: &ActionHash| {
                let hash = hash.clone();
                join3(&events.get(&hash), &cancellations.get(&hash), &ticker)
                    .map(move |(event, cancellations, now)| EventWithStatus {
                        original_action_hash: hash.clone(),
                        status: derive_event_status(event, cancellations, *now),
                        current_event: event.clone(),
                    })
                    .dedup()
            })
        };

        let proposals = keyed_poll("proposal", period, &client, |client, hash| async move {
            client.get_latest_proposal(&hash).await
        });
        let proposal_cancellations =
            keyed_poll("proposal_cancellations", period, &client, |client, hash| async move {
                client.get_cancellations_for(&hash).await
            });
        let proposal_events = {
            let client = client.clone();
            let hub = hub.clone();
            KeyedCache::new(move |hash: &ActionHash| {
                let client = client.clone();
                let hash = hash.clone();
                let filter = LinkFilter::new("ProposalToEvents").with_base(hash.clone());
                live_links_readable(&hub, filter, period, move || {
                    let client = client.clone();
                    let hash = hash.clone();
                    async move { client.get_events_for_proposal(&hash).await }
                })
            })
        };
        let call_to_actions =
            keyed_poll("call_to_action", period, &client, |client, hash| async move {
                client.get_latest_call_to_action(&hash).await
            });
        let assemblies_for_call_to_action =
            keyed_poll("assemblies", period, &client, |client, hash| async move {
                client.get_assemblies_for_call_to_action(&hash).await
            });
        let commitments_for_call_to_action =
            keyed_poll("commitments", period, &client, |client, hash| async move {
                client.get_commitments_for_call_to_action(&hash).await
            });
        let participants_for_call_to_action = {
            let commitments = commitments_for_call_to_action.clone();
            KeyedCache::new(move |hash: &ActionHash| {
                commitments.get(hash).map(|c| participants(c)).dedup()
            })
        };
        let proposal_status = {
            let proposals = proposals.clone();
            let cancellations = proposal_cancellations.clone();
            let proposal_events = proposal_events.clone();
            let call_to_actions = call_to_actions.clone();
            let assemblies = assemblies_for_call_to_action.clone();
            let ticker = ticker.clone();
            KeyedCache::new(move |hash: &ActionHash| {
                let proposal = proposals.get(hash);
                let aggregation = {
                    let call_to_actions = call_to_actions.clone();
                    let assemblies = assemblies.clone();
                    proposal.then(move |proposal| {
                        let cta_hash = &proposal.entry.call_to_action_hash;
                        join2(&call_to_actions.get(cta_hash), &assemblies.get(cta_hash))
                    })
                };
                let record = join3(
                    &proposal,
                    &cancellations.get(hash),
                    &proposal_events.get(hash),
                );
                let hash = hash.clone();
                join3(&record, &aggregation, &ticker)
                    .map(move |((proposal, cancellations, links), (cta, assemblies), now)| {
                        let events: Vec<ActionHash> = targets(links);
                        let aggregation = Aggregation::new(&cta.entry, assemblies);
                        ProposalWithStatus {
                            original_action_hash: hash.clone(),
                            status: derive_proposal_status(
                                proposal,
                                cancellations,
                                &aggregation,
                                &events,
                                *now,
                            ),
                            current_proposal: proposal.clone(),
                            call_to_action: cta.clone(),
                        }
                    })
                    .dedup()
            })
        };

        let all_upcoming_events = {
            let links = collection(&hub, &client, period, "UpcomingEvents", |c| async move {
                c.get_all_upcoming_events().await
            });
            watched(&trigger, &event_status, &links, |hash, e: &EventWithStatus| {
                match e.status {
                    EventStatus::UpcomingEvent => None,
                    EventStatus::PastEvent => Some(Advance::MarkEventPast(hash.clone())),
                    EventStatus::CancelledEvent => Some(Advance::MarkEventCancelled(hash.clone())),
                }
            })
            .map(|items| {
                let mut upcoming: Vec<&EventWithStatus> = items
                    .iter()
                    .map(|(_, e)| e)
                    .filter(|e| e.status == EventStatus::UpcomingEvent)
                    .collect();
                upcoming.sort_by_key(|e| Reverse(e.current_event.entry.time.start_time()));
                upcoming
                    .into_iter()
                    .map(|e| IndexedHash::event(e.original_action_hash.clone()))
                    .collect::<Vec<_>>()
            })
            .dedup()
        };
        let all_open_proposals = {
            let links = collection(&hub, &client, period, "OpenProposals", |c| async move {
                c.get_all_open_proposals().await
            });
            watched(&trigger, &proposal_status, &links, |hash, p: &ProposalWithStatus| {
                match p.status {
                    ProposalStatus::ExpiredProposal => {
                        Some(Advance::MarkProposalExpired(hash.clone()))
                    }
                    ProposalStatus::CancelledProposal => {
                        Some(Advance::MarkProposalCancelled(hash.clone()))
                    }
                    _ => None,
                }
            })
            .map(|items| {
                let mut open: Vec<&ProposalWithStatus> = items
                    .iter()
                    .map(|(_, p)| p)
                    .filter(|p| {
                        matches!(
                            p.status,
                            ProposalStatus::OpenProposal | ProposalStatus::FulfilledProposal { .. }
                        )
                    })
                    .collect();
                open.sort_by_key(|p| {
                    Reverse(
                        p.current_proposal
                            .entry
                            .time
                            .as_ref()
                            .map_or(Timestamp::MAX, |t| t.start_time()),
                    )
                });
                open.into_iter()
                    .map(|p| IndexedHash::proposal(p.original_action_hash.clone()))
                    .collect::<Vec<_>>()
            })
            .dedup()
        };

        // The archived collections are listed from their links alone. Their entries are
        // watched on the side, to move cancelled and uncancelled ones.
        let all_past_events = {
            let links = collection(&hub, &client, period, "PastEvents", |c| async move {
                c.get_all_past_events().await
            });
            let cancelled = watched(&trigger, &event_status, &links, |hash, e: &EventWithStatus| {
                (e.status == EventStatus::CancelledEvent)
                    .then(|| Advance::MarkEventCancelled(hash.clone()))
            });
            indexed(&links, IndexedHash::event).keep_alive(&cancelled)
        };
        let all_cancelled_events = {
            let links = collection(&hub, &client, period, "CancelledEvents", |c| async move {
                c.get_all_cancelled_events().await
            });
            let uncancelled = watched(&trigger, &event_status, &links, |hash, e: &EventWithStatus| {
                (e.status != EventStatus::CancelledEvent)
                    .then(|| Advance::MarkEventUpcoming(hash.clone()))
            });
            indexed(&links, IndexedHash::event).keep_alive(&uncancelled)
        };
        let all_expired_proposals = {
            let links = collection(&hub, &client, period, "ExpiredProposals", |c| async move {
                c.get_all_expired_proposals().await
            });
            let cancelled =
                watched(&trigger, &proposal_status, &links, |hash, p: &ProposalWithStatus| {
                    (p.status == ProposalStatus::CancelledProposal)
                        .then(|| Advance::MarkProposalCancelled(hash.clone()))
                });
            indexed(&links, IndexedHash::proposal).keep_alive(&cancelled)
        };
        let all_cancelled_proposals = {
            let links = collection(&hub, &client, period, "CancelledProposals", |c| async move {
                c.get_all_cancelled_proposals().await
            });
            let uncancelled =
                watched(&trigger, &proposal_status, &links, |hash, p: &ProposalWithStatus| {
                    (p.status != ProposalStatus::CancelledProposal)
                        .then(|| Advance::MarkProposalOpen(hash.clone()))
                });
            indexed(&links, IndexedHash::proposal).keep_alive(&uncancelled)
        };
        let my_events = {
            let client = client.clone();
            let filter = LinkFilter::new("MyEvents").with_base(my_pub_key.clone());
            live_links_readable(&hub, filter, period, move || {
                let client = client.clone();
                async move { client.get_my_events().await }
            })
            .map(|links| targets(links))
            .dedup()
        };

        Ok(Self {
            client,
            my_pub_key,
            ticker,
            queue,
            events,
            event_cancellations,
            event_status,
            proposals,
            proposal_cancellations,
            proposal_events,
            proposal_status,
            call_to_actions,
            assemblies_for_call_to_action,
            commitments_for_call_to_action,
            participants_for_call_to_action,
            all_upcoming_events,
            all_past_events,
            all_cancelled_events,
            all_open_proposals,
            all_expired_proposals,
            all_cancelled_proposals,
            my_events,
            _worker: worker,
        })
    }

    pub fn my_pub_key(&self) -> &AgentPubKey {
        &self.my_pub_key
    }
    /// The current time, re-emitted every clock tick.
    pub fn ticker(&self) -> &Readable<Timestamp> {
        &self.ticker
    }
    pub fn effect_queue(&self) -> &EffectQueue {
        &self.queue
    }

    /// Upcoming events, latest start time first.
    ///
    /// Events of the collection that have become past or were cancelled are reported to the
    /// backend.
    pub fn all_upcoming_events(&self) -> Readable<Vec<IndexedHash>> {
        self.all_upcoming_events.clone()
    }
    pub fn all_past_events(&self) -> Readable<Vec<IndexedHash>> {
        self.all_past_events.clone()
    }
    /// Cancelled events. Events whose cancellations were all removed are reported to the
    /// backend as upcoming again.
    pub fn all_cancelled_events(&self) -> Readable<Vec<IndexedHash>> {
        self.all_cancelled_events.clone()
    }

    /// Open and fulfilled proposals, latest start time first. Proposals without a time come
    /// first.
    ///
    /// Proposals of the collection that have expired or were cancelled are reported to the
    /// backend.
    pub fn all_open_proposals(&self) -> Readable<Vec<IndexedHash>> {
        self.all_open_proposals.clone()
    }
    pub fn all_expired_proposals(&self) -> Readable<Vec<IndexedHash>> {
        self.all_expired_proposals.clone()
    }
    /// Cancelled proposals. Proposals whose cancellations were all removed are reported to
    /// the backend as open again.
    pub fn all_cancelled_proposals(&self) -> Readable<Vec<IndexedHash>> {
        self.all_cancelled_proposals.clone()
    }

    /// Events and proposals the local agent takes part in.
    pub fn my_events(&self) -> Readable<Vec<ActionHash>> {
        self.my_events.clone()
    }

    pub fn my_upcoming_events(&self) -> Readable<Vec<IndexedHash>> {
        intersection(&self.my_events, &self.all_upcoming_events)
    }
    pub fn my_past_events(&self) -> Readable<Vec<IndexedHash>> {
        intersection(&self.my_events, &self.all_past_events)
    }
    pub fn my_cancelled_events(&self) -> Readable<Vec<IndexedHash>> {
        intersection(&self.my_events, &self.all_cancelled_events)
    }
    pub fn my_open_proposals(&self) -> Readable<Vec<IndexedHash>> {
        intersection(&self.my_events, &self.all_open_proposals)
    }
    pub fn my_expired_proposals(&self) -> Readable<Vec<IndexedHash>> {
        intersection(&self.my_events, &self.all_expired_proposals)
    }
    pub fn my_cancelled_proposals(&self) -> Readable<Vec<IndexedHash>> {
        intersection(&self.my_events, &self.all_cancelled_proposals)
    }

    pub fn all_upcoming(&self) -> Readable<Vec<IndexedHash>> {
        concat(&self.all_upcoming_events, &self.all_open_proposals)
    }
    pub fn all_past(&self) -> Readable<Vec<IndexedHash>> {
        concat(&self.all_past_events, &self.all_expired_proposals)
    }
    pub fn all_cancelled(&self) -> Readable<Vec<IndexedHash>> {
        concat(&self.all_cancelled_events, &self.all_cancelled_proposals)
    }
    pub fn my_upcoming(&self) -> Readable<Vec<IndexedHash>> {
        concat(&self.my_upcoming_events(), &self.my_open_proposals())
    }
    pub fn my_past(&self) -> Readable<Vec<IndexedHash>> {
        concat(&self.my_past_events(), &self.my_expired_proposals())
    }
    pub fn my_cancelled(&self) -> Readable<Vec<IndexedHash>> {
        concat(&self.my_cancelled_events(), &self.my_cancelled_proposals())
    }

    pub fn participants_for_event(&self, event_hash: &ActionHash) -> Readable<Vec<Participant>> {
        let participants = self.participants_for_call_to_action.clone();
        self.events
            .get(event_hash)
            .then(move |event| participants.get(&event.entry.call_to_action_hash))
    }
    pub fn participants_for_proposal(
        &self,
        proposal_hash: &ActionHash,
    ) -> Readable<Vec<Participant>> {
        let participants = self.participants_for_call_to_action.clone();
        self.proposals
            .get(proposal_hash)
            .then(move |proposal| participants.get(&proposal.entry.call_to_action_hash))
    }

    /// Joins `alerts` with the current status of the events and proposals they mention.
    pub fn alerts_with_status(
        &self,
        alerts: &Readable<Vec<Alert<GatherAlert>>>,
    ) -> Readable<AlertsWithStatus> {
        let event_status = self.event_status.clone();
        let proposal_status = self.proposal_status.clone();
        alerts
            .then(move |alerts| {
                let mut events: Vec<ActionHash> = Vec::new();
                let mut proposals: Vec<ActionHash> = Vec::new();
                for alert in alerts {
                    let (hashes, hash) = match &alert.alert {
                        GatherAlert::EventAlert { event_hash, .. } => (&mut events, event_hash),
                        GatherAlert::ProposalAlert { proposal_hash, .. } => {
                            (&mut proposals, proposal_hash)
                        }
                    };
                    if !hashes.contains(hash) {
                        hashes.push(hash.clone());
                    }
                }
                let alerts = alerts.clone();
                join2(
                    &join_all_filtered(event_status.slice(&events)),
                    &join_all_filtered(proposal_status.slice(&proposals)),
                )
                .map(move |(events, proposals)| AlertsWithStatus {
                    alerts: alerts.clone(),
                    events: events.iter().map(|(_, e)| e.clone()).collect(),
                    proposals: proposals.iter().map(|(_, p)| p.clone()).collect(),
                })
            })
            .dedup()
    }

    pub async fn create_event(&self, event: &Event) -> Result<EntryRecord<Event>, SyncError> {
        self.client.create_event(event).await
    }
    pub async fn create_proposal(
        &self,
        proposal: &Proposal,
    ) -> Result<EntryRecord<Proposal>, SyncError> {
        self.client.create_proposal(proposal).await
    }
    /// Attaches a cancellation to an event or a proposal.
    pub async fn cancel(&self, hash: &ActionHash, reason: &str) -> Result<ActionHash, SyncError> {
        self.client.create_cancellation(hash, reason).await
    }
}

/// A global link set, with no base filter.
fn collection<F, Fut>(
    hub: &SignalHub<LinkSignal>,
    client: &GatherClient,
    period: Duration,
    link_type: &'static str,
    fetch: F,
) -> Readable<Vec<CreateLink>>
where
    F: Fn(GatherClient) -> Fut + 'static,
    Fut: Future<Output = Result<Vec<CreateLink>, SyncError>> + 'static,
{
    let client = client.clone();
    live_links_readable(hub, LinkFilter::new(link_type), period, move || {
        fetch(client.clone())
    })
}

fn keyed_poll<T, F, Fut>(
    name: &'static str,
    period: Duration,
    client: &GatherClient,
    fetch: F,
) -> KeyedCache<ActionHash, Readable<T>>
where
    T: Clone + PartialEq + 'static,
    F: Fn(GatherClient, ActionHash) -> Fut + 'static,
    Fut: Future<Output = Result<T, SyncError>> + 'static,
{
    let client = client.clone();
    let fetch = Rc::new(fetch);
    KeyedCache::new(move |hash: &ActionHash| {
        let client = client.clone();
        let hash = hash.clone();
        let fetch = fetch.clone();
        poll_readable(name, period, move || fetch(client.clone(), hash.clone()))
    })
}

/// Link targets without duplicates, in link order.
fn targets(links: &[CreateLink]) -> Vec<ActionHash> {
    let mut seen = HashSet::new();
    links
        .iter()
        .map(|link| &link.target_address)
        .filter(|hash| seen.insert(*hash))
        .cloned()
        .collect()
}

fn indexed(
    links: &Readable<Vec<CreateLink>>,
    index: fn(ActionHash) -> IndexedHash,
) -> Readable<Vec<IndexedHash>> {
    links
        .map(move |links| targets(links).into_iter().map(index).collect::<Vec<_>>())
        .dedup()
}

/// The values of the link targets in `cache`, with `detect` run on each of them by `trigger`.
fn watched<T: Clone + 'static>(
    trigger: &LifecycleTrigger,
    cache: &KeyedCache<ActionHash, Readable<T>>,
    links: &Readable<Vec<CreateLink>>,
    detect: impl Fn(&ActionHash, &T) -> Option<Advance> + 'static,
) -> Readable<Vec<(ActionHash, T)>> {
    let cache = cache.clone();
    let values = links.then(move |links| join_all_filtered(cache.slice(&targets(links))));
    trigger.observe(&values, move |items| {
        items
            .iter()
            .filter_map(|(hash, value)| detect(hash, value))
            .collect()
    })
}

fn intersection(
    mine: &Readable<Vec<ActionHash>>,
    all: &Readable<Vec<IndexedHash>>,
) -> Readable<Vec<IndexedHash>> {
    join2(mine, all)
        .map(|(mine, all)| {
            mine.iter()
                .filter_map(|hash| all.iter().find(|h| &h.hash == hash).cloned())
                .collect::<Vec<_>>()
        })
        .dedup()
}

fn concat(
    a: &Readable<Vec<IndexedHash>>,
    b: &Readable<Vec<IndexedHash>>,
) -> Readable<Vec<IndexedHash>> {
    join2(a, b).map(|(a, b)| a.iter().chain(b).cloned().collect::<Vec<_>>())
}
