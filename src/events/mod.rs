use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::OrderStatus;

/// Publishes domain events to the background processor.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event after a commit. Delivery failure is logged only; the
    /// committed operation stands either way.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
        order_number: String,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderDeleted {
        order_id: Uuid,
    },
    CartUpdated {
        cart_id: Uuid,
        customer_id: Uuid,
        version: i32,
    },
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderCreated {
                order_id,
                customer_id,
                order_number,
                total,
            } => {
                // Order history views for this customer are now stale
                info!(
                    %order_id,
                    %customer_id,
                    %order_number,
                    %total,
                    "order created; customer order history invalidated"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
            Event::OrderDeleted { order_id } => {
                info!(%order_id, "order deleted");
            }
            Event::CartUpdated {
                cart_id,
                customer_id,
                version,
            } => {
                info!(%cart_id, %customer_id, version, "cart updated");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_the_receiver_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();

        sender.send_or_log(Event::OrderDeleted { order_id }).await;
        sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: OrderStatus::Pending,
                new_status: OrderStatus::Confirmed,
            })
            .await;

        assert_eq!(rx.recv().await, Some(Event::OrderDeleted { order_id }));
        assert!(matches!(
            rx.recv().await,
            Some(Event::OrderStatusChanged { new_status: OrderStatus::Confirmed, .. })
        ));
    }

    #[tokio::test]
    async fn send_to_closed_channel_is_not_fatal() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender
            .send(Event::OrderDeleted {
                order_id: Uuid::nil()
            })
            .await
            .is_err());
        sender
            .send_or_log(Event::OrderDeleted {
                order_id: Uuid::nil(),
            })
            .await;
    }

    #[tokio::test]
    async fn processor_exits_when_senders_drop() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(Event::OrderDeleted {
            order_id: Uuid::nil(),
        })
        .await
        .unwrap();
        drop(tx);

        process_events(rx).await;
    }
}
