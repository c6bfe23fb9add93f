//! Stripe Checkout Sessions over its form-encoded REST API.

use super::{CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider};
use async_trait::async_trait;
use serde::Deserialize;

const CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

pub struct StripeCheckout {
    client: reqwest::Client,
    secret_key: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: String,
}

impl StripeCheckout {
    pub fn new(secret_key: impl Into<String>) -> Self {
        StripeCheckout {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            endpoint: CHECKOUT_SESSIONS_URL.to_string(),
        }
    }

    /// Point at a different API base (stripe-mock, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Stripe's bracketed form keys for one card-paid line item.
pub(crate) fn form_fields(request: &CheckoutRequest) -> Vec<(String, String)> {
    let item = &request.line_item;
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("customer_email".to_string(), request.customer_email.clone()),
        ("client_reference_id".to_string(), request.client_reference_id.clone()),
        ("line_items[0][quantity]".to_string(), item.quantity.to_string()),
        ("line_items[0][price_data][currency]".to_string(), item.currency.clone()),
        ("line_items[0][price_data][unit_amount]".to_string(), item.unit_amount.to_string()),
        ("line_items[0][price_data][product_data][name]".to_string(), item.name.clone()),
    ];
    if !item.description.is_empty() {
        form.push((
            "line_items[0][price_data][product_data][description]".to_string(),
            item.description.clone(),
        ));
    }
    for (i, image) in item.images.iter().enumerate() {
        form.push((format!("line_items[0][price_data][product_data][images][{}]", i), image.clone()));
    }
    form
}

#[async_trait]
impl PaymentProvider for StripeCheckout {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.secret_key)
            .form(&form_fields(request))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_default();
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        let session: CheckoutSession = response.json().await?;
        tracing::info!(session = %session.id, reference = %request.client_reference_id, "checkout session created");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::LineItem;

    #[test]
    fn line_item_uses_bracketed_keys() {
        let request = CheckoutRequest {
            success_url: "http://localhost/ok".into(),
            cancel_url: "http://localhost/tour/the-forest-hiker".into(),
            customer_email: "ann@example.com".into(),
            client_reference_id: "tour-1".into(),
            line_item: LineItem {
                name: "The Forest Hiker Tour".into(),
                description: "Breathtaking hike".into(),
                images: vec!["http://localhost/img/tours/cover.jpg".into()],
                unit_amount: 39_700,
                currency: "usd".into(),
                quantity: 1,
            },
        };
        let form = form_fields(&request);
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("39700"));
        assert_eq!(get("line_items[0][price_data][product_data][images][0]"), Some("http://localhost/img/tours/cover.jpg"));
        assert_eq!(get("mode"), Some("payment"));
    }
}
