//! Hosted checkout: priced line item and redirect URLs in, checkout session reference out.

mod stripe;

pub use stripe::StripeCheckout;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("payments are not configured")]
    Disabled,
    #[error("payment provider request: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    /// Smallest currency unit (cents).
    pub unit_amount: i64,
    pub currency: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    pub client_reference_id: String,
    pub line_item: LineItem,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError>;
}

/// Used when no provider key is configured; every checkout fails.
pub struct DisabledPayments;

#[async_trait]
impl PaymentProvider for DisabledPayments {
    async fn create_checkout_session(&self, _request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        Err(PaymentError::Disabled)
    }
}
