//! Delivery dispatcher: one fan-out round for one alert.
//!
//! Resolves subscribers, calls each of their channel adapters once, writes
//! one delivery log row per attempt and finally counts the round on the
//! alert. Individual channel failures are recorded, never raised; only a
//! failed subscriber resolution fails the round as a whole.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use crate::channels::{ChannelOutcome, ChannelRegistry, DeliveryContext};
use crate::models::{Alert, Channel, DeliveryAttempt, DeliveryStatus, Recipient, Template};
use crate::resolver::{self, Resolution, ResolutionFailure};
use crate::store::Repository;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// At least one subscriber got at least one successful delivery.
    Delivered,
    NoSuccessfulDeliveries,
    NoSubscribers,
    ResolutionFailed { reason: String },
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Delivered => "delivered",
            DispatchOutcome::NoSuccessfulDeliveries => "no_successful_deliveries",
            DispatchOutcome::NoSubscribers => "no_subscribers",
            DispatchOutcome::ResolutionFailed { .. } => "resolution_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelResult {
    pub channel: Channel,
    pub success: bool,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attempt number of the log row; `None` if the row could not be written.
    pub attempt: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriberResult {
    pub user_id: Uuid,
    pub delivered: bool,
    pub channels: Vec<ChannelResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub alert_id: Uuid,
    pub success: bool,
    pub outcome: DispatchOutcome,
    pub total_subscribers: usize,
    pub successful_subscribers: usize,
    pub results: Vec<SubscriberResult>,
}

impl DispatchReport {
    fn empty(alert_id: Uuid, outcome: DispatchOutcome) -> Self {
        Self {
            alert_id,
            success: false,
            outcome,
            total_subscribers: 0,
            successful_subscribers: 0,
            results: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    repo: Arc<dyn Repository>,
    channels: ChannelRegistry,
}

impl Dispatcher {
    pub fn new(repo: Arc<dyn Repository>, channels: ChannelRegistry) -> Self {
        Self { repo, channels }
    }

    pub async fn dispatch(&self, alert: &Alert) -> DispatchReport {
        let report = self.run(alert).await;
        counter!("alert_dispatch_total", "outcome" => report.outcome.label()).increment(1);
        tracing::info!(
            alert_id = %alert.id,
            outcome = report.outcome.label(),
            subscribers = report.total_subscribers,
            successful = report.successful_subscribers,
            "alert dispatch finished"
        );
        report
    }

    async fn run(&self, alert: &Alert) -> DispatchReport {
        let resolved = resolver::derive_scope(self.repo.as_ref(), alert.scope_ids()).and_then(|scope| {
            resolver::resolve(self.repo.as_ref(), alert, &scope).map(|r| (scope, r))
        });

        let (scope, subscribers) = match resolved {
            Ok((scope, Resolution::Subscribers(subs))) => (scope, subs),
            Ok((_, Resolution::NoSubscribers)) => {
                return DispatchReport::empty(alert.id, DispatchOutcome::NoSubscribers);
            }
            Err(e) => return self.resolution_failed(alert, e),
        };

        let mut templates: HashMap<Channel, Option<Template>> = HashMap::new();
        let mut results = Vec::with_capacity(subscribers.len());

        for subscriber in &subscribers {
            let recipient = self.recipient(alert, subscriber.user_id);
            let mut channel_results = Vec::with_capacity(subscriber.channels.len());

            for &channel in subscriber.channels.iter() {
                let template = templates
                    .entry(channel)
                    .or_insert_with(|| self.template(alert, channel))
                    .clone();

                let outcome = match &recipient {
                    Ok(r) if !r.is_active => ChannelOutcome {
                        status: DeliveryStatus::Unsubscribed,
                        ..ChannelOutcome::failed("recipient account is inactive", Default::default())
                    },
                    Ok(r) => {
                        let ctx = DeliveryContext {
                            alert,
                            recipient: r,
                            scope: &scope,
                            template: template.as_ref(),
                        };
                        match self.channels.get(channel) {
                            Some(adapter) => adapter.deliver(&ctx).await,
                            None => ChannelOutcome::failed(
                                format!("no adapter registered for {channel}"),
                                Default::default(),
                            ),
                        }
                    }
                    Err(reason) => ChannelOutcome::failed(reason.clone(), Default::default()),
                };

                channel_results.push(self.record(alert, subscriber.user_id, channel, outcome));
            }

            results.push(SubscriberResult {
                user_id: subscriber.user_id,
                delivered: channel_results.iter().any(|c| c.success),
                channels: channel_results,
            });
        }

        if let Err(e) = self.repo.record_fanout_round(alert.id, Utc::now()) {
            tracing::error!(alert_id = %alert.id, error = %e, "failed to record delivery round");
        }

        let successful = results.iter().filter(|r| r.delivered).count();
        DispatchReport {
            alert_id: alert.id,
            success: successful > 0,
            outcome: if successful > 0 {
                DispatchOutcome::Delivered
            } else {
                DispatchOutcome::NoSuccessfulDeliveries
            },
            total_subscribers: results.len(),
            successful_subscribers: successful,
            results,
        }
    }

    fn resolution_failed(&self, alert: &Alert, err: ResolutionFailure) -> DispatchReport {
        tracing::error!(alert_id = %alert.id, error = %err, "subscriber resolution failed");
        DispatchReport::empty(
            alert.id,
            DispatchOutcome::ResolutionFailed { reason: err.to_string() },
        )
    }

    fn recipient(&self, alert: &Alert, user_id: Uuid) -> Result<Recipient, String> {
        self.repo.recipient(user_id).map_err(|e| {
            tracing::warn!(alert_id = %alert.id, user_id = %user_id, error = %e, "recipient lookup failed");
            e.to_string()
        })
    }

    fn template(&self, alert: &Alert, channel: Channel) -> Option<Template> {
        self.repo
            .active_template(alert.alert_type, channel)
            .unwrap_or_else(|e| {
                tracing::warn!(alert_id = %alert.id, channel = %channel, error = %e, "template lookup failed, using default");
                None
            })
    }

    fn record(&self, alert: &Alert, user_id: Uuid, channel: Channel, outcome: ChannelOutcome) -> ChannelResult {
        counter!(
            "alert_deliveries_total",
            "channel" => channel.as_str(),
            "status" => outcome.status.as_str()
        )
        .increment(1);

        if let Some(error) = &outcome.error {
            tracing::warn!(alert_id = %alert.id, user_id = %user_id, channel = %channel, error = %error, "channel delivery failed");
        }

        let attempt = self
            .repo
            .append_delivery_log(DeliveryAttempt {
                alert_id: alert.id,
                user_id,
                channel,
                status: outcome.status,
                response: outcome.response,
                error_message: outcome.error.clone(),
            })
            .map(|log| log.attempt)
            .map_err(|e| {
                tracing::error!(alert_id = %alert.id, channel = %channel, error = %e, "failed to write delivery log");
            })
            .ok();

        ChannelResult {
            channel,
            success: outcome.success,
            status: outcome.status,
            error: outcome.error,
            attempt,
        }
    }
}
