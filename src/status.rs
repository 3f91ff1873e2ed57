//! Pure status derivation.
//!
//! Statuses are never stored: they are recomputed from the record, its cancellations, its
//! aggregation and the current time every time one of them changes.

use crate::{
    ActionHash, Aggregation, Commitment, EntryRecord, Event, EventStatus, Participant, Proposal,
    ProposalStatus, Timestamp,
};

#[cfg(test)]
mod tests;

pub fn derive_event_status(
    event: &EntryRecord<Event>,
    cancellations: &[ActionHash],
    now: Timestamp,
) -> EventStatus {
    if !cancellations.is_empty() {
        EventStatus::CancelledEvent
    } else if is_past(&event.entry, now) {
        EventStatus::PastEvent
    } else {
        EventStatus::UpcomingEvent
    }
}

pub fn derive_proposal_status(
    _proposal: &EntryRecord<Proposal>,
    cancellations: &[ActionHash],
    aggregation: &Aggregation,
    events: &[ActionHash],
    now: Timestamp,
) -> ProposalStatus {
    if !cancellations.is_empty() {
        return ProposalStatus::CancelledProposal;
    }
    if let Some(event_hash) = events.first() {
        return ProposalStatus::ActualEvent {
            event_hash: event_hash.clone(),
        };
    }
    if let Some(assembly_hash) = &aggregation.assembly {
        return ProposalStatus::FulfilledProposal {
            assembly_hash: assembly_hash.clone(),
        };
    }
    if is_expired(aggregation, now) {
        return ProposalStatus::ExpiredProposal;
    }
    ProposalStatus::OpenProposal
}

pub fn is_past(event: &Event, now: Timestamp) -> bool {
    event.time.end_time().is_some_and(|end| end < now)
}

pub fn is_expired(aggregation: &Aggregation, now: Timestamp) -> bool {
    aggregation.expiration_time.is_some_and(|t| t < now)
}

/// Authors of attendance commitments, in order of first commitment.
///
/// An agent with several commitments appears once, with the latest of them.
pub fn participants(commitments: &[EntryRecord<Commitment>]) -> Vec<Participant> {
    let mut participants: Vec<Participant> = Vec::new();
    for commitment in commitments.iter().filter(|c| c.entry.need_index == 0) {
        match participants.iter_mut().find(|p| p.agent == commitment.author) {
            Some(p) => p.commitment_hash = commitment.action_hash.clone(),
            None => participants.push(Participant {
                agent: commitment.author.clone(),
                commitment_hash: commitment.action_hash.clone(),
            }),
        }
    }
    participants
}
