// ABOUTME: Consent store recording which (user, client) pairs were granted by the user
// ABOUTME: Lookup failures are logged and treated as missing consent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use oauth_labs_core::errors::StorageError;
use oauth_labs_core::models::Consent;

use crate::storage::ConsentRepository;

/// User consent grants
#[derive(Clone)]
pub struct ConsentStore {
    consents: Arc<dyn ConsentRepository>,
}

impl ConsentStore {
    /// Creates a store over the given repository
    #[must_use]
    pub fn new(consents: Arc<dyn ConsentRepository>) -> Self {
        Self { consents }
    }

    /// Whether the user consented to the client; backend errors count as no consent
    pub async fn has_consent(&self, consent: &Consent) -> bool {
        match self.consents.exists(consent).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    user_id = %consent.user_id,
                    client_id = %consent.client_id,
                    error = %e,
                    "Consent lookup failed"
                );
                false
            }
        }
    }

    /// Record the user's consent
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn grant(&self, consent: &Consent) -> Result<(), StorageError> {
        self.consents.create(consent).await
    }

    /// Remove the user's consent
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn revoke(&self, consent: &Consent) -> Result<(), StorageError> {
        self.consents.delete(consent).await
    }

    /// Clients the user consented to
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn clients_for_user(&self, user_id: &str) -> Result<Vec<String>, StorageError> {
        self.consents.list_for_user(user_id).await
    }
}
