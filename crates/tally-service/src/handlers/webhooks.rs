//! Payment provider webhook handler.
//!
//! The provider delivers events at least once; duplicates are
//! acknowledged as received without reapplying them, so retried delivery
//! never alarms the provider.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::SubscriptionTier;
use tally_ledger::PaymentEvent;

use crate::crypto;
use crate::error::ApiError;
use crate::state::AppState;

/// Provider webhook payload.
#[derive(Debug, Deserialize)]
pub struct ProviderWebhook {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Provider session id for the triggering checkout or subscription.
    pub session_id: String,

    /// The affected user.
    pub user_id: String,

    /// Event metadata.
    #[serde(default)]
    pub metadata: ProviderMetadata,
}

/// Known metadata fields on provider events.
#[derive(Debug, Default, Deserialize)]
pub struct ProviderMetadata {
    /// Credits purchased (checkout events).
    pub credits: Option<i64>,

    /// Tier code (subscription events).
    pub tier: Option<String>,

    /// Subscription expiry (subscription events).
    pub expires_at: Option<DateTime<Utc>>,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was received and processed.
    pub received: bool,

    /// `false` for duplicates and unhandled event types.
    pub applied: bool,
}

/// Handle payment provider webhooks.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    // Verify signature if a webhook secret is configured
    if let Some(secret) = &state.config.payment_webhook_secret {
        let signature = headers
            .get("x-provider-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing webhook signature".into()))?;

        if !crypto::verify_signature(&body, signature, secret) {
            tracing::warn!("Invalid payment webhook signature");
            return Err(ApiError::BadRequest("Invalid webhook signature".into()));
        }
    } else {
        // No secret configured - skip verification (development mode)
        tracing::warn!("Payment webhook secret not configured - skipping signature verification");
    }

    let webhook: ProviderWebhook =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %webhook.event_type,
        session_id = %webhook.session_id,
        "Received payment webhook"
    );

    let user_id = webhook
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid user_id: {}", webhook.user_id)))?;

    let event = match webhook.event_type.as_str() {
        "checkout.completed" => {
            let credits = webhook
                .metadata
                .credits
                .ok_or_else(|| ApiError::BadRequest("Missing credits in metadata".into()))?;
            Some(PaymentEvent::CheckoutCompleted {
                session_id: webhook.session_id,
                user_id,
                credits,
            })
        }
        "subscription.activated" | "subscription.updated" | "subscription.renewed" => {
            Some(PaymentEvent::SubscriptionActivated {
                user_id,
                tier: resolve_tier(webhook.metadata.tier.as_deref()),
                expires_at: webhook.metadata.expires_at,
            })
        }
        "subscription.canceled" | "subscription.deleted" => {
            Some(PaymentEvent::SubscriptionCanceled { user_id })
        }
        other => {
            tracing::debug!(event_type = %other, "Unhandled payment event");
            None
        }
    };

    let applied = match event {
        Some(event) => state.payments.handle(event)?.applied,
        None => false,
    };

    Ok(Json(WebhookResponse {
        received: true,
        applied,
    }))
}

/// Resolve a tier from the provider's plan code.
fn resolve_tier(code: Option<&str>) -> SubscriptionTier {
    match code {
        Some("starter") => SubscriptionTier::Starter,
        Some("pro") => SubscriptionTier::Pro,
        Some("max") => SubscriptionTier::Max,
        Some(other) => {
            tracing::warn!(tier = %other, "Unknown tier code, treating as free");
            SubscriptionTier::Free
        }
        None => SubscriptionTier::Free,
    }
}
