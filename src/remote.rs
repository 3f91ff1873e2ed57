use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::{
    ActionHash, CallToAction, Commitment, CreateLink, DeletedLink, EntryRecord, Event, Proposal,
    SyncError,
};

/// Request/response access to the backend.
pub trait RemoteClient {
    fn call(
        &self,
        method: &str,
        payload: Value,
    ) -> LocalBoxFuture<'static, Result<Value, SyncError>>;
}

/// Typed calls on top of a [`RemoteClient`].
#[derive(Clone)]
pub struct GatherClient {
    remote: Rc<dyn RemoteClient>,
}

impl GatherClient {
    pub fn new(remote: Rc<dyn RemoteClient>) -> Self {
        Self { remote }
    }

    async fn call<I: Serialize, O: DeserializeOwned>(
        &self,
        method: &'static str,
        input: &I,
    ) -> Result<O, SyncError> {
        let payload = serde_json::to_value(input).map_err(|e| SyncError::Encode {
            method: method.into(),
            message: e.to_string(),
        })?;
        tracing::trace!(method, "remote call");
        let output = self.remote.call(method, payload).await?;
        serde_json::from_value(output).map_err(|e| SyncError::Decode {
            method: method.into(),
            message: e.to_string(),
        })
    }

    /// Like `call`, but a `null` answer is reported as [`SyncError::NotFound`].
    async fn get<I: Serialize, O: DeserializeOwned>(
        &self,
        method: &'static str,
        hash: &I,
        what: impl FnOnce() -> String,
    ) -> Result<O, SyncError> {
        let output: Option<O> = self.call(method, hash).await?;
        output.ok_or_else(|| SyncError::NotFound(what()))
    }

    pub async fn get_latest_event(
        &self,
        hash: &ActionHash,
    ) -> Result<EntryRecord<Event>, SyncError> {
        self.get("get_latest_event", hash, || format!("event {hash}")).await
    }
    pub async fn get_latest_proposal(
        &self,
        hash: &ActionHash,
    ) -> Result<EntryRecord<Proposal>, SyncError> {
        self.get("get_latest_proposal", hash, || format!("proposal {hash}")).await
    }
    pub async fn get_latest_call_to_action(
        &self,
        hash: &ActionHash,
    ) -> Result<EntryRecord<CallToAction>, SyncError> {
        self.get("get_latest_call_to_action", hash, || {
            format!("call to action {hash}")
        })
        .await
    }

    pub async fn get_all_upcoming_events(&self) -> Result<Vec<CreateLink>, SyncError> {
        self.call("get_all_upcoming_events", &()).await
    }
    pub async fn get_all_past_events(&self) -> Result<Vec<CreateLink>, SyncError> {
        self.call("get_all_past_events", &()).await
    }
    pub async fn get_all_cancelled_events(&self) -> Result<Vec<CreateLink>, SyncError> {
        self.call("get_all_cancelled_events", &()).await
    }
    pub async fn get_all_open_proposals(&self) -> Result<Vec<CreateLink>, SyncError> {
        self.call("get_all_open_proposals", &()).await
    }
    pub async fn get_all_expired_proposals(&self) -> Result<Vec<CreateLink>, SyncError> {
        self.call("get_all_expired_proposals", &()).await
    }
    pub async fn get_all_cancelled_proposals(&self) -> Result<Vec<CreateLink>, SyncError> {
        self.call("get_all_cancelled_proposals", &()).await
    }
    pub async fn get_my_events(&self) -> Result<Vec<CreateLink>, SyncError> {
        self.call("get_my_events", &()).await
    }
    pub async fn get_events_for_proposal(
        &self,
        proposal_hash: &ActionHash,
    ) -> Result<Vec<CreateLink>, SyncError> {
        self.call("get_events_for_proposal", proposal_hash).await
    }

    /// Hashes of the cancellations attached to `hash`.
    pub async fn get_cancellations_for(
        &self,
        hash: &ActionHash,
    ) -> Result<Vec<ActionHash>, SyncError> {
        self.call("get_cancellations_for", hash).await
    }
    pub async fn get_assemblies_for_call_to_action(
        &self,
        call_to_action_hash: &ActionHash,
    ) -> Result<Vec<ActionHash>, SyncError> {
        self.call("get_assemblies_for_call_to_action", call_to_action_hash).await
    }

    pub async fn create_event(&self, event: &Event) -> Result<EntryRecord<Event>, SyncError> {
        self.call("create_event", event).await
    }
    pub async fn create_proposal(
        &self,
        proposal: &Proposal,
    ) -> Result<EntryRecord<Proposal>, SyncError> {
        self.call("create_proposal", proposal).await
    }
    pub async fn create_cancellation(
        &self,
        cancelled_hash: &ActionHash,
        reason: &str,
    ) -> Result<ActionHash, SyncError> {
        self.call(
            "create_cancellation",
            &json!({ "cancelled_hash": cancelled_hash, "reason": reason }),
        )
        .await
    }

    pub async fn mark_event_past(&self, event_hash: &ActionHash) -> Result<(), SyncError> {
        self.call("mark_event_past", event_hash).await
    }
    pub async fn mark_proposal_as_expired(
        &self,
        proposal_hash: &ActionHash,
    ) -> Result<(), SyncError> {
        self.call("mark_proposal_as_expired", proposal_hash).await
    }
    pub async fn mark_event_as_cancelled(&self, event_hash: &ActionHash) -> Result<(), SyncError> {
        self.call("mark_event_as_cancelled", event_hash).await
    }
    pub async fn mark_proposal_as_cancelled(
        &self,
        proposal_hash: &ActionHash,
    ) -> Result<(), SyncError> {
        self.call("mark_proposal_as_cancelled", proposal_hash).await
    }
    pub async fn mark_event_as_upcoming(&self, event_hash: &ActionHash) -> Result<(), SyncError> {
        self.call("mark_event_as_upcoming", event_hash).await
    }
    pub async fn mark_proposal_as_open(&self, proposal_hash: &ActionHash) -> Result<(), SyncError> {
        self.call("mark_proposal_as_open", proposal_hash).await
    }

    /// Commitments to a call to action that have not been cancelled.
    pub async fn get_commitments_for_call_to_action(
        &self,
        call_to_action_hash: &ActionHash,
    ) -> Result<Vec<EntryRecord<Commitment>>, SyncError> {
        self.call("get_commitments_for_call_to_action", call_to_action_hash).await
    }

    pub async fn get_unread_alerts(&self) -> Result<Vec<CreateLink>, SyncError> {
        self.call("get_unread_alerts", &()).await
    }
    pub async fn get_read_alerts(&self) -> Result<Vec<DeletedLink>, SyncError> {
        self.call("get_read_alerts", &()).await
    }
    pub async fn mark_alerts_as_read(&self, link_hashes: &[ActionHash]) -> Result<(), SyncError> {
        self.call("mark_alerts_as_read", &link_hashes).await
    }
}
