//! Fan-out of one edition to every eligible recipient.
//!
//! Each (recipient, channel) pair is isolated: a failure is recorded as a
//! [`DeliveryOutcome`] and never stops other pairs. Only tracking-store
//! failures propagate, because without them the run cannot promise it will
//! not deliver twice.

use super::EditionCourier;
use crate::channels::{DropoffRequest, dropoff_path};
use crate::error::{DatabaseError, Error, Result};
use crate::preferences::{EffectivePreference, resolve};
use crate::retry::{bounded_call, call_with_timeout};
use crate::types::{
    Artifact, Channel, ChannelCounts, DeliveryOutcome, Edition, EditionKey, Event, Publication,
    Recipient,
};
use crate::utils::{dropoff_file_name, sanitize_file_name};
use chrono::{Datelike, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Aggregated fan-out result for one edition
#[derive(Debug, Default)]
pub(crate) struct FanOut {
    pub(crate) counts: ChannelCounts,
    pub(crate) deliveries: Vec<DeliveryOutcome>,
}

/// Result for one recipient
struct RecipientDelivery {
    outcomes: Vec<DeliveryOutcome>,
    already_delivered: usize,
}

impl EditionCourier {
    /// Deliver `artifact` to every recipient whose preferences ask for it
    pub(crate) async fn fan_out(
        &self,
        publication: &Publication,
        edition: &Edition,
        key: &EditionKey,
        artifact: Arc<Artifact>,
        recipients: &[Recipient],
    ) -> Result<FanOut> {
        let (mut counts, plan) = self.plan(publication, recipients);

        tracing::info!(
            publication_id = %publication.id,
            edition_key = %key,
            recipients = counts.recipients,
            eligible = counts.eligible,
            "Fanning out edition"
        );

        let mut delivered: Vec<(usize, Result<RecipientDelivery>)> = stream::iter(plan)
            .map(|(index, recipient, preference)| {
                let artifact = Arc::clone(&artifact);
                async move {
                    let delivery = self
                        .deliver_to_recipient(
                            &publication.id,
                            edition,
                            key,
                            artifact,
                            &recipient,
                            &preference,
                        )
                        .await;
                    (index, delivery)
                }
            })
            .buffer_unordered(self.config.delivery.max_concurrent_recipients)
            .collect()
            .await;

        // Completion order is arbitrary; report in recipient order
        delivered.sort_by_key(|(index, _)| *index);

        let mut deliveries = Vec::new();
        for (_, delivery) in delivered {
            let delivery = delivery?;
            counts.already_delivered += delivery.already_delivered;
            deliveries.extend(delivery.outcomes);
        }
        tally(&mut counts, &deliveries);

        Ok(FanOut { counts, deliveries })
    }

    /// What a real fan-out would do, without calling any transport
    pub(crate) fn simulate_fan_out(
        &self,
        publication: &Publication,
        edition: &Edition,
        recipients: &[Recipient],
    ) -> FanOut {
        let (mut counts, plan) = self.plan(publication, recipients);

        let mut deliveries = Vec::new();
        for (_, recipient, preference) in plan {
            if preference.notify_enabled {
                deliveries.push(DeliveryOutcome::simulated(
                    &recipient.identity,
                    Channel::Notify,
                    None,
                ));
            }
            if let Some(destination) = preference
                .dropoff_destination
                .as_deref()
                .filter(|_| preference.dropoff_enabled)
            {
                // Extension is only known after download
                let file_name = format!(
                    "{} - {}",
                    edition.publication_date.format("%Y-%m-%d"),
                    sanitize_file_name(&edition.title)
                );
                let path = dropoff_path(destination, year_folder(&preference, edition), &file_name);
                deliveries.push(DeliveryOutcome::simulated(
                    &recipient.identity,
                    Channel::Dropoff,
                    Some(path),
                ));
            }
        }

        for outcome in &deliveries {
            self.emit_event(Event::Delivered {
                publication_id: publication.id.clone(),
                recipient: outcome.recipient.clone(),
                channel: outcome.channel,
                simulated: true,
            });
        }
        tally(&mut counts, &deliveries);

        FanOut { counts, deliveries }
    }

    /// Resolve preferences and keep the recipients with something to receive
    ///
    /// The plan owns its recipients so the delivery stream can live inside a
    /// spawned publication task.
    fn plan(
        &self,
        publication: &Publication,
        recipients: &[Recipient],
    ) -> (ChannelCounts, Vec<(usize, Recipient, EffectivePreference)>) {
        let mut counts = ChannelCounts::default();
        let mut plan = Vec::new();

        for (index, recipient) in recipients.iter().enumerate() {
            if !recipient.active {
                continue;
            }
            counts.recipients += 1;

            let preference = resolve(recipient, publication, &self.defaults);
            if preference.is_empty() {
                tracing::debug!(
                    publication_id = %publication.id,
                    recipient = %recipient.identity,
                    "No channel enabled for recipient"
                );
                continue;
            }
            counts.eligible += 1;
            plan.push((index, recipient.clone(), preference));
        }

        (counts, plan)
    }

    async fn deliver_to_recipient(
        &self,
        publication_id: &str,
        edition: &Edition,
        key: &EditionKey,
        artifact: Arc<Artifact>,
        recipient: &Recipient,
        preference: &EffectivePreference,
    ) -> Result<RecipientDelivery> {
        let ledger_enabled = self.config.delivery.ledger_enabled;
        let already = if ledger_enabled {
            self.tracker
                .delivered_channels(key, &recipient.identity)
                .await?
        } else {
            Vec::new()
        };

        let wants_notify = preference.notify_enabled;
        let wants_dropoff = preference.wants_dropoff();
        let notify_done = wants_notify && already.contains(&Channel::Notify);
        let dropoff_done = wants_dropoff && already.contains(&Channel::Dropoff);
        let already_delivered = usize::from(notify_done) + usize::from(dropoff_done);
        if already_delivered > 0 {
            tracing::debug!(
                recipient = %recipient.identity,
                edition_key = %key,
                channels = ?already,
                "Skipping channels delivered by an earlier run"
            );
        }

        let notify = async {
            if wants_notify && !notify_done {
                Some(self.notify_recipient(recipient, &artifact, edition).await)
            } else {
                None
            }
        };
        let dropoff = async {
            if wants_dropoff && !dropoff_done {
                Some(
                    self.dropoff_for_recipient(recipient, preference, edition, Arc::clone(&artifact))
                        .await,
                )
            } else {
                None
            }
        };
        let (notify, dropoff) = tokio::join!(notify, dropoff);
        let outcomes: Vec<DeliveryOutcome> = notify.into_iter().chain(dropoff).collect();

        for outcome in &outcomes {
            if outcome.success {
                if ledger_enabled {
                    self.tracker
                        .record_delivery(
                            key,
                            &recipient.identity,
                            outcome.channel,
                            outcome.reference.as_deref(),
                        )
                        .await?;
                }
                self.emit_event(Event::Delivered {
                    publication_id: publication_id.to_string(),
                    recipient: recipient.identity.clone(),
                    channel: outcome.channel,
                    simulated: false,
                });
            } else {
                tracing::warn!(
                    publication_id = %publication_id,
                    recipient = %recipient.identity,
                    channel = %outcome.channel,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "Delivery failed"
                );
                self.emit_event(Event::DeliveryFailed {
                    publication_id: publication_id.to_string(),
                    recipient: recipient.identity.clone(),
                    channel: outcome.channel,
                    error: outcome.error.clone().unwrap_or_default(),
                });
            }
        }

        // Counted once per recipient per edition, on its first verified delivery
        if already.is_empty() && outcomes.iter().any(|o| o.success) {
            self.record_recipient_delivery(&recipient.identity, publication_id)
                .await?;
        }

        Ok(RecipientDelivery {
            outcomes,
            already_delivered,
        })
    }

    async fn notify_recipient(
        &self,
        recipient: &Recipient,
        artifact: &Artifact,
        edition: &Edition,
    ) -> DeliveryOutcome {
        let notifier = &self.collaborators.notifier;
        let sent = bounded_call(
            "notify",
            self.config.timeouts.notify,
            &self.config.retry,
            || notifier.send(recipient, artifact, edition),
        )
        .await;

        match sent {
            Ok(true) => {
                tracing::debug!(recipient = %recipient.identity, notifier = notifier.name(), "Notification sent");
                DeliveryOutcome::delivered(&recipient.identity, Channel::Notify, None)
            }
            Ok(false) => DeliveryOutcome::failed(
                &recipient.identity,
                Channel::Notify,
                "notification rejected by transport",
            ),
            Err(e) => DeliveryOutcome::failed(&recipient.identity, Channel::Notify, e.to_string()),
        }
    }

    async fn dropoff_for_recipient(
        &self,
        recipient: &Recipient,
        preference: &EffectivePreference,
        edition: &Edition,
        artifact: Arc<Artifact>,
    ) -> DeliveryOutcome {
        let Some(destination) = preference.dropoff_destination.clone() else {
            return DeliveryOutcome::failed(
                &recipient.identity,
                Channel::Dropoff,
                "no drop-off destination configured",
            );
        };

        let request = DropoffRequest {
            recipient: recipient.identity.clone(),
            destination,
            year_folder: year_folder(preference, edition),
            file_name: dropoff_file_name(edition, &artifact),
            artifact,
        };

        let dropoff = &self.collaborators.dropoff;
        let receipt = bounded_call(
            "dropoff",
            self.config.timeouts.dropoff,
            &self.config.retry,
            || dropoff.deliver(request.clone()),
        )
        .await;

        match receipt {
            Ok(receipt) if receipt.success => {
                tracing::debug!(
                    recipient = %recipient.identity,
                    path = %request.relative_path(),
                    "Drop-off verified"
                );
                DeliveryOutcome::delivered(
                    &recipient.identity,
                    Channel::Dropoff,
                    receipt.reference_url.or(receipt.reference_id),
                )
            }
            Ok(receipt) => DeliveryOutcome::failed(
                &recipient.identity,
                Channel::Dropoff,
                receipt
                    .error
                    .unwrap_or_else(|| "drop-off not confirmed by transport".to_string()),
            ),
            Err(e) => DeliveryOutcome::failed(&recipient.identity, Channel::Dropoff, e.to_string()),
        }
    }

    /// Bump the recipient's delivery stats in the store
    ///
    /// Recipients passed to [`run`](EditionCourier::run) need not be stored;
    /// those are skipped.
    async fn record_recipient_delivery(&self, identity: &str, publication_id: &str) -> Result<()> {
        let recorded = call_with_timeout(
            "store: record recipient delivery",
            self.config.tracking.store_timeout,
            self.db
                .record_recipient_delivery(identity, publication_id, Utc::now()),
        )
        .await;

        match recorded {
            Err(Error::Database(DatabaseError::NotFound(_))) => {
                tracing::debug!(recipient = %identity, "Recipient not stored; delivery stats not recorded");
                Ok(())
            }
            other => other,
        }
    }
}

fn year_folder(preference: &EffectivePreference, edition: &Edition) -> Option<i32> {
    preference
        .organize_by_year
        .then(|| edition.publication_date.year())
}

fn tally(counts: &mut ChannelCounts, deliveries: &[DeliveryOutcome]) {
    for outcome in deliveries {
        match (outcome.channel, outcome.success) {
            (Channel::Notify, true) => counts.notified += 1,
            (Channel::Notify, false) => counts.notify_failed += 1,
            (Channel::Dropoff, true) => counts.dropped_off += 1,
            (Channel::Dropoff, false) => counts.dropoff_failed += 1,
            (Channel::Archive, _) => {}
        }
    }
}
