//! Waiting for a submitted signature to reach a terminal state.

use std::time::Duration;

use serde_json::Value;
use solana_sdk::{signature::Signature, transaction::TransactionError};
use tracing::{info, warn};

use crate::{
    config::{ClientConfig, Commitment},
    errors::{Error, Result},
    pubsub::{SignatureSubscription, StatusSubscription},
};

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Terminal state of a submitted signature
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    Finalized,
    Failed(String),
    TimedOut(Duration),
    ChannelClosed,
}

impl ConfirmationOutcome {
    pub fn into_result(self) -> Result<()> {
        match self {
            ConfirmationOutcome::Finalized => Ok(()),
            ConfirmationOutcome::Failed(reason) => Err(Error::Transaction(reason)),
            ConfirmationOutcome::TimedOut(timeout) => Err(Error::ConfirmationTimeout(timeout)),
            ConfirmationOutcome::ChannelClosed => Err(Error::ConnectionClosed),
        }
    }
}

/// Render a notification error, using the SDK's wording when it parses.
fn describe_error(err: Value) -> String {
    match serde_json::from_value::<TransactionError>(err.clone()) {
        Ok(tx_err) => tx_err.to_string(),
        Err(_) => err.to_string(),
    }
}

/// Race the first notification on `subscription` against `timeout`.
///
/// The subscription is released exactly once before returning.
pub async fn await_outcome<S>(subscription: &mut S, timeout: Duration) -> ConfirmationOutcome
where
    S: StatusSubscription + ?Sized,
{
    let outcome = tokio::select! {
        notification = subscription.next_notification() => match notification {
            Some(notification) => match notification.err {
                None => ConfirmationOutcome::Finalized,
                Some(err) => ConfirmationOutcome::Failed(describe_error(err)),
            },
            None => ConfirmationOutcome::ChannelClosed,
        },
        _ = tokio::time::sleep(timeout) => ConfirmationOutcome::TimedOut(timeout),
    };

    subscription.release().await;

    match &outcome {
        ConfirmationOutcome::Finalized => info!("Signature reached a terminal success state"),
        other => warn!("Confirmation ended with {:?}", other),
    }
    outcome
}

/// Subscribe to `signature` on `ws_url` and wait for it to land at `commitment`.
///
/// `timeout` bounds the subscribe handshake and then, separately, the wait
/// for the first notification.
pub async fn wait_for_confirmation(
    ws_url: &str,
    signature: &Signature,
    commitment: Commitment,
    timeout: Duration,
) -> Result<()> {
    let mut subscription =
        SignatureSubscription::subscribe(ws_url, signature, commitment, timeout).await?;
    await_outcome(&mut subscription, timeout).await.into_result()
}

pub async fn wait_with_config(config: &ClientConfig, signature: &Signature) -> Result<()> {
    wait_for_confirmation(
        config.ws_url(),
        signature,
        config.commitment,
        config.confirmation_timeout(),
    )
    .await
}
