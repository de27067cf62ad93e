//! Per-connection event delivery.
//!
//! A connection runs two loops side by side: one consumes client commands
//! (subscription changes), the other forwards filtered bus events. When
//! either loop ends, for any reason, the other is dropped and the outbound
//! side is closed.

use std::fmt::Display;

use futures::{Sink, SinkExt, Stream, StreamExt};
use raven_security::User;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::event::Event;
use crate::subscriber::Subscriber;

/// Commands a client may send over its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum ClientCommand {
    #[serde(rename = "subscriptions.add")]
    AddSubscriptions { paths: Vec<String> },
    #[serde(rename = "subscriptions.remove")]
    RemoveSubscriptions { paths: Vec<String> },
}

pub struct EventConnection {
    subscriber: RwLock<Subscriber>,
    events: broadcast::Receiver<String>,
}

impl EventConnection {
    /// Attach to the bus immediately; events published from here on are
    /// seen by [`run`](Self::run).
    pub fn new(bus: &EventBus, user: Option<User>, subscriptions: Vec<String>) -> Self {
        Self {
            subscriber: RwLock::new(Subscriber::new(user).with_subscriptions(subscriptions)),
            events: bus.subscribe(),
        }
    }

    /// Current subscription patterns.
    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriber.read().await.subscriptions.clone()
    }

    pub async fn apply(&self, command: ClientCommand) {
        apply_command(&self.subscriber, command).await;
    }

    /// Drive the connection until the client goes away or the bus closes.
    pub async fn run<I, E, O>(self, mut inbound: I, mut outbound: O)
    where
        I: Stream<Item = Result<String, E>> + Unpin,
        E: Display,
        O: Sink<String> + Unpin,
        O::Error: Display,
    {
        let Self {
            subscriber,
            mut events,
        } = self;

        let commands = async {
            while let Some(message) = inbound.next().await {
                let text = match message {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Inbound stream failed");
                        break;
                    }
                };
                match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => apply_command(&subscriber, command).await,
                    Err(e) => warn!(error = %e, "Ignoring unrecognised client command"),
                }
            }
        };

        let deliveries = async {
            loop {
                let message = match events.recv().await {
                    Ok(message) => message,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Subscriber lagged behind the event bus");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let event = match Event::decode(&message) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable bus message");
                        continue;
                    }
                };
                let Some(normalized) = subscriber.read().await.deliver(&event) else {
                    continue;
                };
                let json = match serde_json::to_string(&normalized) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Skipping unserializable event");
                        continue;
                    }
                };
                if let Err(e) = outbound.send(json).await {
                    debug!(error = %e, "Outbound sink closed");
                    break;
                }
            }
        };

        tokio::select! {
            _ = commands => debug!("Command stream ended"),
            _ = deliveries => debug!("Delivery stream ended"),
        }

        if let Err(e) = outbound.close().await {
            debug!(error = %e, "Error closing outbound sink");
        }
        info!("Event connection closed");
    }
}

async fn apply_command(subscriber: &RwLock<Subscriber>, command: ClientCommand) {
    let mut subscriber = subscriber.write().await;
    match command {
        ClientCommand::AddSubscriptions { paths } => subscriber.subscribe(paths),
        ClientCommand::RemoveSubscriptions { paths } => subscriber.unsubscribe(&paths),
    }
    debug!(subscriptions = ?subscriber.subscriptions, "Subscriptions updated");
}
