use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::entities::user::Role;

/// Domain events emitted by the engine. Consumers (notifications, audit)
/// subscribe through the processor task; emission is fire-and-forget and
/// never fails the originating request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        user_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderItemMarkedSent {
        order_id: Uuid,
        item_id: Uuid,
        seller_id: Uuid,
    },
    VerificationRequested {
        user_id: Uuid,
    },
    VerificationApproved {
        user_id: Uuid,
    },
    VerificationRejected {
        user_id: Uuid,
        reason: String,
    },
    RoleChanged {
        user_id: Uuid,
        new_role: Role,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging instead of failing when the channel is closed
    /// or full.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!(error = %e, "Failed to enqueue domain event");
        }
    }
}

/// Background consumer draining the event channel.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                order_number,
                user_id,
            } => {
                info!(%order_id, %order_number, %user_id, "order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
            Event::OrderItemMarkedSent {
                order_id,
                item_id,
                seller_id,
            } => {
                info!(%order_id, %item_id, %seller_id, "order item marked sent");
            }
            Event::VerificationRequested { user_id } => {
                info!(%user_id, "seller verification requested");
            }
            Event::VerificationApproved { user_id } => {
                info!(%user_id, "seller verification approved");
            }
            Event::VerificationRejected { user_id, reason } => {
                info!(%user_id, %reason, "seller verification rejected");
            }
            Event::RoleChanged { user_id, new_role } => {
                info!(%user_id, %new_role, "account role changed");
            }
        }
        debug!(?event, "event processed");
    }
    info!("Event processor stopped");
}
