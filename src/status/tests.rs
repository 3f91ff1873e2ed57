use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::{Commitment, EventTime, HoloHash, Participant};

fn event(start_time: Timestamp, end_time: Timestamp) -> EntryRecord<Event> {
    EntryRecord {
        action_hash: HoloHash::action("event"),
        author: HoloHash::agent("alice"),
        timestamp: 0,
        entry: Event {
            hosts: vec![HoloHash::agent("alice")],
            title: "meetup".into(),
            description: String::new(),
            location: "park".into(),
            time: EventTime::Unique {
                start_time,
                end_time,
            },
            cost: None,
            call_to_action_hash: HoloHash::action("cta"),
            from_proposal: None,
        },
    }
}

fn proposal() -> EntryRecord<Proposal> {
    EntryRecord {
        action_hash: HoloHash::action("proposal"),
        author: HoloHash::agent("alice"),
        timestamp: 0,
        entry: Proposal {
            hosts: vec![HoloHash::agent("alice")],
            title: "idea".into(),
            description: String::new(),
            location: None,
            time: None,
            cost: None,
            call_to_action_hash: HoloHash::action("cta"),
        },
    }
}

fn fulfilled(assembly: &str) -> ProposalStatus {
    ProposalStatus::FulfilledProposal {
        assembly_hash: HoloHash::action(assembly),
    }
}
fn actual_event(event: &str) -> ProposalStatus {
    ProposalStatus::ActualEvent {
        event_hash: HoloHash::action(event),
    }
}

fn hashes(names: &[&str]) -> Vec<ActionHash> {
    names.iter().map(|name| HoloHash::action(*name)).collect()
}

#[rstest]
#[case(&[], 50, EventStatus::UpcomingEvent)]
#[case(&[], 200, EventStatus::UpcomingEvent)]
#[case(&[], 201, EventStatus::PastEvent)]
#[case(&["c"], 50, EventStatus::CancelledEvent)]
#[case(&["c"], 500, EventStatus::CancelledEvent)]
fn event_status(
    #[case] cancellations: &[&str],
    #[case] now: Timestamp,
    #[case] expected: EventStatus,
) {
    let status = derive_event_status(&event(100, 200), &hashes(cancellations), now);
    assert_eq!(status, expected);
}

#[test]
fn unbounded_periodic_event_is_never_past() {
    let mut event = event(100, 200);
    event.entry.time = EventTime::Periodic {
        start_time: 100,
        event_duration: 10,
        period_duration: 100,
        occurrences: None,
    };
    assert_eq!(
        derive_event_status(&event, &[], i64::MAX),
        EventStatus::UpcomingEvent
    );
}

#[rstest]
#[case(&[], None, Some(100), &[], 50, ProposalStatus::OpenProposal)]
#[case(&[], None, None, &[], 1_000, ProposalStatus::OpenProposal)]
#[case(&[], None, Some(100), &[], 101, ProposalStatus::ExpiredProposal)]
#[case(&[], Some("a"), Some(100), &[], 101, fulfilled("a"))]
#[case(&[], Some("a"), None, &["e", "f"], 0, actual_event("e"))]
#[case(&["c"], Some("a"), Some(100), &["e"], 101, ProposalStatus::CancelledProposal)]
#[case(&["c"], None, None, &[], 0, ProposalStatus::CancelledProposal)]
#[case(&["c"], None, Some(100), &[], 50, ProposalStatus::CancelledProposal)]
fn proposal_status(
    #[case] cancellations: &[&str],
    #[case] assembly: Option<&str>,
    #[case] expiration_time: Option<Timestamp>,
    #[case] events: &[&str],
    #[case] now: Timestamp,
    #[case] expected: ProposalStatus,
) {
    let aggregation = Aggregation {
        assembly: assembly.map(HoloHash::action),
        expiration_time,
    };
    let status = derive_proposal_status(
        &proposal(),
        &hashes(cancellations),
        &aggregation,
        &hashes(events),
        now,
    );
    assert_eq!(status, expected);
}

#[test]
fn derivation_is_deterministic() {
    let aggregation = Aggregation {
        assembly: None,
        expiration_time: Some(100),
    };
    for now in [0, 99, 100, 101, 10_000] {
        let a = derive_proposal_status(&proposal(), &[], &aggregation, &[], now);
        let b = derive_proposal_status(&proposal(), &[], &aggregation, &[], now);
        assert_eq!(a, b);
        assert_eq!(
            derive_event_status(&event(100, 200), &[], now),
            derive_event_status(&event(100, 200), &[], now)
        );
    }
}

fn commitment(hash: &str, author: &str, need_index: u32) -> EntryRecord<Commitment> {
    EntryRecord {
        action_hash: HoloHash::action(hash),
        author: HoloHash::agent(author),
        timestamp: 0,
        entry: Commitment {
            call_to_action_hash: HoloHash::action("cta"),
            need_index,
            amount: 1,
            comment: String::new(),
        },
    }
}

#[test]
fn participants_are_attendance_commitment_authors() {
    let commitments = [
        commitment("c1", "alice", 0),
        commitment("c2", "bob", 1),
        commitment("c3", "carol", 0),
        commitment("c4", "alice", 0),
    ];
    assert_eq!(
        participants(&commitments),
        vec![
            Participant {
                agent: HoloHash::agent("alice"),
                commitment_hash: HoloHash::action("c4"),
            },
            Participant {
                agent: HoloHash::agent("carol"),
                commitment_hash: HoloHash::action("c3"),
            },
        ]
    );
    assert!(participants(&[]).is_empty());
}
