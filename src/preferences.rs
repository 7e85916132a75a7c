//! Per-recipient preference resolution
//!
//! [`resolve`] merges a recipient's override for a publication with the
//! publication's defaults and the global defaults. It performs no I/O.
//!
//! Two recipient states are deliberately treated differently:
//! - no preference list at all: the recipient predates preferences and gets
//!   every publication with its defaults (opt-out)
//! - a list without an entry for the publication: the recipient has chosen
//!   what they want, and this is not it (opt-in)

use crate::config::DeliveryConfig;
use crate::types::{Publication, Recipient};
use serde::Serialize;

/// Defaults applied when neither recipient nor publication decide
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalDefaults {
    /// Organize drop-offs into year folders
    pub organize_by_year: bool,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            organize_by_year: true,
        }
    }
}

impl From<&DeliveryConfig> for GlobalDefaults {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            organize_by_year: config.organize_by_year,
        }
    }
}

/// Delivery configuration for one (recipient, publication) pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EffectivePreference {
    /// Send a notification
    pub notify_enabled: bool,
    /// Drop the artifact off
    pub dropoff_enabled: bool,
    /// Where to drop it off
    pub dropoff_destination: Option<String>,
    /// Put drop-offs into a year folder
    pub organize_by_year: bool,
}

impl EffectivePreference {
    /// Nothing at all for this pair
    pub fn none(defaults: &GlobalDefaults) -> Self {
        Self {
            notify_enabled: false,
            dropoff_enabled: false,
            dropoff_destination: None,
            organize_by_year: defaults.organize_by_year,
        }
    }

    /// Drop-off is enabled and has somewhere to go
    pub fn wants_dropoff(&self) -> bool {
        self.dropoff_enabled && self.dropoff_destination.is_some()
    }

    /// No channel will fire
    pub fn is_empty(&self) -> bool {
        !self.notify_enabled && !self.wants_dropoff()
    }
}

/// Resolve what `recipient` receives for `publication`
///
/// Precedence is recipient entry, then publication default, then global
/// default. Inactive recipients and entries with `enabled = false` get
/// nothing.
pub fn resolve(
    recipient: &Recipient,
    publication: &Publication,
    defaults: &GlobalDefaults,
) -> EffectivePreference {
    if !recipient.active {
        return EffectivePreference::none(defaults);
    }

    let publication_year = publication
        .organize_by_year
        .unwrap_or(defaults.organize_by_year);

    let Some(prefs) = &recipient.preferences else {
        return EffectivePreference {
            notify_enabled: publication.notify_enabled,
            dropoff_enabled: publication.dropoff_enabled,
            dropoff_destination: publication.dropoff_destination.clone(),
            organize_by_year: publication_year,
        };
    };

    let Some(entry) = prefs.iter().find(|p| p.publication_id == publication.id) else {
        return EffectivePreference::none(defaults);
    };

    if !entry.enabled {
        return EffectivePreference::none(defaults);
    }

    EffectivePreference {
        notify_enabled: entry.notify_enabled.unwrap_or(publication.notify_enabled),
        dropoff_enabled: entry.dropoff_enabled.unwrap_or(publication.dropoff_enabled),
        dropoff_destination: entry
            .custom_dropoff_destination
            .clone()
            .or_else(|| publication.dropoff_destination.clone()),
        organize_by_year: entry.organize_by_year.unwrap_or(publication_year),
    }
}
