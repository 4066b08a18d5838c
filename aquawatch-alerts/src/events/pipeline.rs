use std::sync::Arc;

use uuid::Uuid;

use aquawatch_shared::types::event::{payloads, routing_keys, Event};

use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::models::{Alert, GeoScope};
use crate::push::{AlertPayload, PushHub, PushMessage};
use crate::resolver;
use crate::store::Repository;

/// Work done after an alert is persisted, off the request path.
#[derive(Clone)]
pub struct AlertPipeline {
    repo: Arc<dyn Repository>,
    hub: PushHub,
    dispatcher: Dispatcher,
}

impl AlertPipeline {
    pub fn new(repo: Arc<dyn Repository>, hub: PushHub, dispatcher: Dispatcher) -> Self {
        Self { repo, hub, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Decode one bus message and act on it.
    pub async fn handle(&self, routing_key: &str, data: &[u8]) -> anyhow::Result<()> {
        match routing_key {
            routing_keys::ALERT_CREATED => {
                let event: Event<payloads::AlertCreated> = serde_json::from_slice(data)?;
                tracing::info!(alert_id = %event.data.alert_id, "received alert.created event");
                self.on_created(event.data.alert_id).await?;
            }
            routing_keys::ALERT_ACKNOWLEDGED | routing_keys::ALERT_RESOLVED => {
                let event: Event<payloads::AlertStatusChanged> = serde_json::from_slice(data)?;
                tracing::info!(
                    alert_id = %event.data.alert_id,
                    status = %event.data.status,
                    "received alert status event"
                );
                self.on_status_changed(event.data.alert_id)?;
            }
            other => tracing::debug!(routing_key = %other, "ignoring alert event"),
        }
        Ok(())
    }

    /// Push to live listeners, then run one delivery round.
    pub async fn on_created(&self, alert_id: Uuid) -> anyhow::Result<DispatchReport> {
        let alert = self.repo.get_alert(alert_id)?;
        let scope = self.scope_for_push(&alert);
        self.hub.broadcast(
            &scope,
            None,
            PushMessage::NewAlert { alert: AlertPayload::new(&alert, &scope) },
        );
        Ok(self.dispatcher.dispatch(&alert).await)
    }

    pub fn on_status_changed(&self, alert_id: Uuid) -> anyhow::Result<()> {
        let alert = self.repo.get_alert(alert_id)?;
        let scope = self.scope_for_push(&alert);
        self.hub.broadcast(
            &scope,
            None,
            PushMessage::AlertUpdate { alert: AlertPayload::new(&alert, &scope) },
        );
        Ok(())
    }

    fn scope_for_push(&self, alert: &Alert) -> GeoScope {
        resolver::derive_scope(self.repo.as_ref(), alert.scope_ids()).unwrap_or_else(|e| {
            tracing::warn!(alert_id = %alert.id, error = %e, "alert scope unresolved, skipping scope groups");
            GeoScope::default()
        })
    }
}
