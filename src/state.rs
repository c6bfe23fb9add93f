//! Shared application state for all routes. Everything here is bound once at startup.

use crate::auth::SessionStore;
use crate::config::{Catalog, ResourceKind, Settings};
use crate::payment::{DisabledPayments, PaymentProvider, StripeCheckout};
use crate::service::Resource;
use crate::store::DocumentStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub catalog: Arc<Catalog>,
    pub sessions: SessionStore,
    pub payments: Arc<dyn PaymentProvider>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Payments use Stripe when a secret key is configured and are disabled otherwise.
    pub fn new(store: Arc<dyn DocumentStore>, catalog: Catalog, settings: Settings) -> Self {
        let payments: Arc<dyn PaymentProvider> = match &settings.stripe_secret_key {
            Some(key) => Arc::new(StripeCheckout::new(key.clone())),
            None => {
                tracing::info!("STRIPE_SECRET_KEY not set, checkout disabled");
                Arc::new(DisabledPayments)
            }
        };
        AppState {
            store,
            catalog: Arc::new(catalog),
            sessions: SessionStore::new(chrono::Duration::hours(settings.session_ttl_hours)),
            payments,
            settings: Arc::new(settings),
        }
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentProvider>) -> Self {
        self.payments = payments;
        self
    }

    pub fn resource(&self, kind: ResourceKind) -> Resource {
        Resource::new(self.catalog.get(kind).clone(), self.store.clone(), self.catalog.clone())
    }
}
