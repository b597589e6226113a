//! Runtime-editable WhatsApp contact settings.
//!
//! A single document (`whatsapp_settings`) in the settings collection. A
//! missing document reads as empty settings; updates merge into whatever is
//! stored so fields written by other tools survive.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::StoreConfig;
use crate::docstore::{self, DocumentStore, StoreError};
use crate::phone::format_phone_number;

pub const WHATSAPP_SETTINGS_ID: &str = "whatsapp_settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppSettings {
    #[serde(default)]
    pub agent_phone: String,
    #[serde(default)]
    pub main_number: String,
    #[serde(default)]
    pub secondary_number: String,
    #[serde(default)]
    pub message_template: String,
    /// Documents written by other tools may lack this; they read as "now".
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl WhatsAppSettings {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            agent_phone: String::new(),
            main_number: String::new(),
            secondary_number: String::new(),
            message_template: String::new(),
            updated_at: now,
        }
    }
}

pub struct SettingsRepository {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn DocumentStore>, config: &StoreConfig) -> Self {
        Self { store, collection: config.settings_collection.clone() }
    }

    pub async fn get_whatsapp_settings(&self) -> Result<WhatsAppSettings, StoreError> {
        let collection = self.collection.clone();
        let doc = docstore::blocking(&self.store, "get_whatsapp_settings", move |s| {
            s.get(&collection, WHATSAPP_SETTINGS_ID)
        })
        .await?;

        match doc {
            Some(doc) => doc.decode(),
            None => Ok(WhatsAppSettings::empty(Utc::now())),
        }
    }

    /// Stamp `updatedAt`, normalise phone numbers and merge into the stored
    /// document. Returns what was written.
    pub async fn update_whatsapp_settings(&self, mut settings: WhatsAppSettings) -> Result<WhatsAppSettings, StoreError> {
        settings.updated_at = Utc::now();
        for number in [&mut settings.agent_phone, &mut settings.main_number, &mut settings.secondary_number] {
            *number = format_phone_number(number);
        }

        let serde_json::Value::Object(fields) = docstore::encode(&settings)? else {
            return Err(StoreError::Malformed {
                id: WHATSAPP_SETTINGS_ID.into(),
                reason: "settings must encode to an object".into(),
            });
        };

        let collection = self.collection.clone();
        docstore::blocking(&self.store, "update_whatsapp_settings", move |s| {
            match s.update(&collection, WHATSAPP_SETTINGS_ID, fields.clone()) {
                Err(StoreError::NotFound { .. }) => s.set(&collection, WHATSAPP_SETTINGS_ID, fields.into()),
                other => other,
            }
        })
        .await?;

        info!(agent_phone = %settings.agent_phone, "whatsapp settings updated");
        Ok(settings)
    }
}
