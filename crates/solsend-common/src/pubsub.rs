//! Websocket `signatureSubscribe` client.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use solana_sdk::signature::Signature;
use tokio::{
    net::TcpStream,
    time::{self, Instant},
};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::Commitment,
    errors::{Error, Result},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SUBSCRIBE_REQUEST_ID: u64 = 1;
const UNSUBSCRIBE_REQUEST_ID: u64 = 2;

/// Status update for a watched signature
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureNotification {
    pub slot: u64,
    /// Execution error reported by the node, `None` on success
    pub err: Option<Value>,
}

/// A live status feed for one signature.
#[async_trait]
pub trait StatusSubscription: Send {
    /// Next notification for the signature, or `None` once the feed is closed.
    async fn next_notification(&mut self) -> Option<SignatureNotification>;

    /// Unsubscribe and close the feed. Calling it again is a no-op.
    async fn release(&mut self);
}

/// `signatureSubscribe` over a websocket connection to the node
pub struct SignatureSubscription {
    stream: Option<WsStream>,
    subscription_id: u64,
    signature: Signature,
}

impl SignatureSubscription {
    /// Connect to `ws_url` and subscribe to `signature` at `commitment`.
    ///
    /// Connecting and the subscribe handshake together must finish within
    /// `timeout`, otherwise `ConfirmationTimeout` is returned. The socket is
    /// closed on every failure after the connection is open.
    pub async fn subscribe(
        ws_url: &str,
        signature: &Signature,
        commitment: Commitment,
        timeout: Duration,
    ) -> Result<Self> {
        let deadline = Instant::now() + timeout;

        info!("Connecting to websocket at {}", ws_url);
        let (mut stream, _) = match time::timeout_at(deadline, connect_async(ws_url)).await {
            Ok(connected) => connected.map_err(|e| {
                Error::Subscription(format!("failed to connect to {}: {}", ws_url, e))
            })?,
            Err(_) => return Err(Error::ConfirmationTimeout(timeout)),
        };

        let request = json!({
            "jsonrpc": "2.0",
            "id": SUBSCRIBE_REQUEST_ID,
            "method": "signatureSubscribe",
            "params": [signature.to_string(), { "commitment": commitment.as_str() }],
        });

        let handshake = time::timeout_at(deadline, Self::handshake(&mut stream, request))
            .await
            .unwrap_or(Err(Error::ConfirmationTimeout(timeout)));
        let subscription_id = match handshake {
            Ok(id) => id,
            Err(e) => {
                let _ = stream.close(None).await;
                return Err(e);
            }
        };
        info!("Subscribed to {} (subscription {})", signature, subscription_id);

        Ok(Self {
            stream: Some(stream),
            subscription_id,
            signature: *signature,
        })
    }

    async fn handshake(stream: &mut WsStream, request: Value) -> Result<u64> {
        stream
            .send(Message::Text(request.to_string()))
            .await
            .map_err(|e| Error::Subscription(format!("failed to send subscription: {}", e)))?;

        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Some(ack) = parse_subscribe_ack(&text, SUBSCRIBE_REQUEST_ID) {
                        return ack;
                    }
                    debug!("Ignoring message before subscription ack: {}", text);
                }
                Ok(Message::Close(frame)) => {
                    debug!("Websocket closed during subscribe: {:?}", frame);
                    return Err(Error::ConnectionClosed);
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::Subscription(format!("websocket error: {}", e)));
                }
            }
        }
        Err(Error::ConnectionClosed)
    }

    pub fn subscription_id(&self) -> u64 {
        self.subscription_id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

#[async_trait]
impl StatusSubscription for SignatureSubscription {
    async fn next_notification(&mut self) -> Option<SignatureNotification> {
        let stream = self.stream.as_mut()?;

        // tungstenite queues pong replies to pings on its own
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => match parse_notification(&text, self.subscription_id) {
                    Some(notification) => return Some(notification),
                    None => debug!("Skipping unrelated websocket message: {}", text),
                },
                Ok(Message::Close(frame)) => {
                    info!("Websocket closed by node: {:?}", frame);
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Websocket error: {}", e);
                    return None;
                }
            }
        }
        None
    }

    async fn release(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        let request = json!({
            "jsonrpc": "2.0",
            "id": UNSUBSCRIBE_REQUEST_ID,
            "method": "signatureUnsubscribe",
            "params": [self.subscription_id],
        });
        // the node drops signature subscriptions after the first notification,
        // so an error reply here is expected and not read
        if let Err(e) = stream.send(Message::Text(request.to_string())).await {
            debug!("Failed to send unsubscribe: {}", e);
        }
        if let Err(e) = stream.close(None).await {
            warn!("Failed to close websocket: {}", e);
        }
        info!("Released subscription {}", self.subscription_id);
    }
}

/// Parse the reply to our subscribe request. `None` if `text` is something else.
fn parse_subscribe_ack(text: &str, request_id: u64) -> Option<Result<u64>> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("id").and_then(Value::as_u64) != Some(request_id) {
        return None;
    }
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Some(Err(Error::Subscription(message.to_string())));
    }
    Some(
        value
            .get("result")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Subscription(format!("missing subscription id in {}", text))),
    )
}

/// Parse a `signatureNotification` addressed to `subscription_id`.
fn parse_notification(text: &str, subscription_id: u64) -> Option<SignatureNotification> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("method")?.as_str()? != "signatureNotification" {
        return None;
    }
    let params = value.get("params")?;
    if params.get("subscription")?.as_u64()? != subscription_id {
        return None;
    }
    let result = params.get("result")?;
    let slot = result.pointer("/context/slot").and_then(Value::as_u64).unwrap_or_default();
    // "receivedSignature" notifications carry a string value
    let status = result.get("value")?.as_object()?;
    let err = status.get("err").filter(|err| !err.is_null()).cloned();

    Some(SignatureNotification { slot, err })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{net::TcpListener, task::JoinHandle};

    #[test]
    fn test_parse_subscribe_ack() {
        let ack = r#"{"jsonrpc":"2.0","result":24006,"id":1}"#;
        assert_eq!(parse_subscribe_ack(ack, 1).unwrap().unwrap(), 24006);

        // reply to a different request
        assert!(parse_subscribe_ack(ack, 2).is_none());

        let refused = r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid param: WrongSize"},"id":1}"#;
        assert!(matches!(
            parse_subscribe_ack(refused, 1),
            Some(Err(Error::Subscription(msg))) if msg.contains("WrongSize")
        ));

        assert!(parse_subscribe_ack("not json", 1).is_none());
    }

    #[test]
    fn test_parse_success_notification() {
        let text = r#"{"jsonrpc":"2.0","method":"signatureNotification","params":{"result":{"context":{"slot":5207624},"value":{"err":null}},"subscription":24006}}"#;
        let notification = parse_notification(text, 24006).unwrap();
        assert_eq!(notification.slot, 5207624);
        assert!(notification.err.is_none());

        assert!(parse_notification(text, 1).is_none());
    }

    #[test]
    fn test_parse_error_notification() {
        let text = r#"{"jsonrpc":"2.0","method":"signatureNotification","params":{"result":{"context":{"slot":9},"value":{"err":{"InstructionError":[0,{"Custom":1}]}}},"subscription":3}}"#;
        let notification = parse_notification(text, 3).unwrap();
        assert_eq!(
            notification.err,
            Some(json!({"InstructionError": [0, {"Custom": 1}]}))
        );
    }

    #[test]
    fn test_skips_other_messages() {
        let received = r#"{"jsonrpc":"2.0","method":"signatureNotification","params":{"result":{"context":{"slot":9},"value":"receivedSignature"},"subscription":3}}"#;
        assert!(parse_notification(received, 3).is_none());

        let slot = r#"{"jsonrpc":"2.0","method":"slotNotification","params":{"result":{"slot":10},"subscription":3}}"#;
        assert!(parse_notification(slot, 3).is_none());

        let unsubscribe_reply = r#"{"jsonrpc":"2.0","result":true,"id":2}"#;
        assert!(parse_notification(unsubscribe_reply, 3).is_none());
    }

    enum Reply {
        Ack(u64),
        Refuse,
        Close,
        Silent,
    }

    /// Serve one websocket connection: answer the subscribe request with
    /// `reply`, push `frames`, then record everything the client sends.
    async fn fake_node(reply: Reply, frames: Vec<String>) -> (String, JoinHandle<Vec<Message>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let mut received = vec![ws.next().await.unwrap().unwrap()];

            match reply {
                Reply::Ack(id) => {
                    let ack = json!({"jsonrpc": "2.0", "result": id, "id": 1});
                    ws.send(Message::Text(ack.to_string())).await.unwrap();
                }
                Reply::Refuse => {
                    let refused = r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid param: WrongSize"},"id":1}"#;
                    ws.send(Message::Text(refused.to_string())).await.unwrap();
                }
                Reply::Close => ws.close(None).await.unwrap(),
                Reply::Silent => {}
            }
            for frame in frames {
                ws.send(Message::Text(frame)).await.unwrap();
            }

            while let Some(Ok(frame)) = ws.next().await {
                received.push(frame);
            }
            received
        });

        (url, handle)
    }

    fn text_json(frame: &Message) -> Value {
        match frame {
            Message::Text(text) => serde_json::from_str(text).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    fn notification(subscription: u64, slot: u64) -> String {
        json!({
            "jsonrpc": "2.0",
            "method": "signatureNotification",
            "params": {
                "result": {"context": {"slot": slot}, "value": {"err": null}},
                "subscription": subscription,
            },
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_subscribe_notify_release() {
        let (url, node) = fake_node(
            Reply::Ack(42),
            vec![notification(7, 1), notification(42, 5)],
        )
        .await;
        let signature = Signature::new_unique();

        let mut sub = SignatureSubscription::subscribe(
            &url,
            &signature,
            Commitment::Finalized,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(sub.subscription_id(), 42);

        // the notification for subscription 7 is skipped
        let received = sub.next_notification().await.unwrap();
        assert_eq!(received, SignatureNotification { slot: 5, err: None });

        sub.release().await;
        sub.release().await;
        assert!(sub.next_notification().await.is_none());

        let frames = node.await.unwrap();
        assert_eq!(frames.len(), 3, "unexpected frames: {:?}", frames);

        let subscribe = text_json(&frames[0]);
        assert_eq!(subscribe["method"], "signatureSubscribe");
        assert_eq!(subscribe["params"][0], signature.to_string());
        assert_eq!(subscribe["params"][1]["commitment"], "finalized");

        let unsubscribe = text_json(&frames[1]);
        assert_eq!(unsubscribe["method"], "signatureUnsubscribe");
        assert_eq!(unsubscribe["params"], json!([42]));

        assert!(matches!(frames[2], Message::Close(_)));
    }

    #[tokio::test]
    async fn test_subscribe_refused() {
        let (url, node) = fake_node(Reply::Refuse, vec![]).await;

        let result = SignatureSubscription::subscribe(
            &url,
            &Signature::new_unique(),
            Commitment::Finalized,
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(Error::Subscription(msg)) if msg.contains("WrongSize")));

        let frames = node.await.unwrap();
        assert!(matches!(frames.last(), Some(Message::Close(_))));
    }

    #[tokio::test]
    async fn test_closed_during_subscribe() {
        let (url, _node) = fake_node(Reply::Close, vec![]).await;

        let result = SignatureSubscription::subscribe(
            &url,
            &Signature::new_unique(),
            Commitment::Finalized,
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_subscribe_timeout_closes_socket() {
        let (url, node) = fake_node(Reply::Silent, vec![]).await;
        let timeout = Duration::from_millis(100);

        let result = SignatureSubscription::subscribe(
            &url,
            &Signature::new_unique(),
            Commitment::Finalized,
            timeout,
        )
        .await;
        assert!(matches!(result, Err(Error::ConfirmationTimeout(t)) if t == timeout));

        let frames = node.await.unwrap();
        assert_eq!(frames.len(), 2, "unexpected frames: {:?}", frames);
        assert!(matches!(frames[1], Message::Close(_)));
    }
}
