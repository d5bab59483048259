use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events published by services after their transactions commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    UserRegistered(Uuid),
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    CheckoutSessionCreated {
        order_id: Uuid,
        session_id: String,
    },
    PaymentSucceeded {
        order_id: Uuid,
        amount: Decimal,
    },
    PaymentFailed {
        payment_intent_id: String,
    },
    PaymentRefunded {
        payment_id: Uuid,
        amount: Decimal,
    },
    ProductReported {
        product_id: Uuid,
        report_id: Uuid,
    },
}

/// Cloneable handle for publishing events.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event. Failure to deliver is logged, never propagated;
    /// events are advisory and must not fail the request that emitted them.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!(error = %e, "event channel closed, dropping event");
        }
    }
}

/// Creates the event channel and spawns the logging consumer.
pub fn spawn_event_processor(capacity: usize) -> EventSender {
    let (tx, mut rx) = mpsc::channel(capacity);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            process_event(event).await;
        }
        info!("event channel closed, processor exiting");
    });
    EventSender::new(tx)
}

async fn process_event(event: Event) {
    match &event {
        Event::OrderCreated(order_id) => info!(order_id = %order_id, "order created"),
        Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status,
        } => info!(order_id = %order_id, %old_status, %new_status, "order status changed"),
        Event::PaymentSucceeded { order_id, amount } => {
            info!(order_id = %order_id, %amount, "payment succeeded")
        }
        Event::PaymentRefunded { payment_id, amount } => {
            info!(payment_id = %payment_id, %amount, "payment refunded")
        }
        other => info!(event = ?other, "event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_after_consumer_drop_does_not_error() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sender = EventSender::new(tx);
        // must not panic or propagate
        sender.send(Event::OrderCreated(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn events_reach_consumer() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();
        sender.send(Event::OrderCreated(id)).await;
        match rx.recv().await {
            Some(Event::OrderCreated(got)) => assert_eq!(got, id),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
