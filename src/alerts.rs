use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::{
    deleted_links_readable, live_links_readable, ActionHash, AgentPubKey, CreateLink,
    GatherClient, LinkFilter, LinkSignal, Readable, SignalHub, SyncConfig, SyncError, Timestamp,
};

pub const ALERTS_LINK_TYPE: &str = "MyAlerts";

/// A notification addressed to the local agent, decoded from the tag of its link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert<T> {
    pub link: CreateLink,
    pub timestamp: Timestamp,
    pub alert: T,
}

impl<T: DeserializeOwned> Alert<T> {
    pub fn from_link(link: &CreateLink) -> Result<Self, SyncError> {
        let alert = serde_json::from_slice(&link.tag).map_err(|e| SyncError::Decode {
            method: "alert tag".into(),
            message: e.to_string(),
        })?;
        Ok(Self {
            link: link.clone(),
            timestamp: link.timestamp,
            alert,
        })
    }
}

pub struct AlertsStore<T: 'static> {
    client: GatherClient,
    unread: Readable<Vec<Alert<T>>>,
    read: Readable<Vec<Alert<T>>>,
}

impl<T> AlertsStore<T>
where
    T: DeserializeOwned + Clone + PartialEq + 'static,
{
    pub fn new(
        client: GatherClient,
        hub: &SignalHub<LinkSignal>,
        my_pub_key: &AgentPubKey,
        config: &SyncConfig,
    ) -> Self {
        let period: Duration = config.poll_interval();
        let filter = LinkFilter::new(ALERTS_LINK_TYPE).with_base(my_pub_key.clone());
        let unread = {
            let client = client.clone();
            live_links_readable(hub, filter.clone(), period, move || {
                let client = client.clone();
                async move { client.get_unread_alerts().await }
            })
            .map(|links| -> Vec<Alert<T>> { to_alerts(links.iter()) })
            .dedup()
        };
        let read = {
            let client = client.clone();
            deleted_links_readable(hub, filter, period, move || {
                let client = client.clone();
                async move { client.get_read_alerts().await }
            })
            .map(|links| -> Vec<Alert<T>> {
                to_alerts(links.iter().map(|l| &l.create_link))
            })
            .dedup()
        };
        Self {
            client,
            unread,
            read,
        }
    }

    /// Alerts not yet marked as read, newest first.
    pub fn unread_alerts(&self) -> Readable<Vec<Alert<T>>> {
        self.unread.clone()
    }
    /// Alerts marked as read, newest first.
    pub fn read_alerts(&self) -> Readable<Vec<Alert<T>>> {
        self.read.clone()
    }

    /// Takes the given alert links out of the unread set.
    pub async fn mark_alerts_as_read(&self, link_hashes: &[ActionHash]) -> Result<(), SyncError> {
        self.client.mark_alerts_as_read(link_hashes).await
    }
}

/// Links whose tag does not decode are left out.
fn to_alerts<'a, T: DeserializeOwned>(
    links: impl Iterator<Item = &'a CreateLink>,
) -> Vec<Alert<T>> {
    let mut alerts: Vec<Alert<T>> = links
        .filter_map(|link| match Alert::from_link(link) {
            Ok(alert) => Some(alert),
            Err(e) => {
                tracing::warn!(link = %link.hash, error = %e, "undecodable alert");
                None
            }
        })
        .collect();
    alerts.sort_by_key(|alert| std::cmp::Reverse(alert.timestamp));
    alerts
}
