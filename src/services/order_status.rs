use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{permissions, Principal};
use crate::entities::order::{self, Entity as OrderEntity, OrderStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// The single transition the owning customer may trigger: confirming receipt
/// of a shipped order.
pub fn customer_may_transition(from: OrderStatus, to: OrderStatus) -> bool {
    matches!((from, to), (OrderStatus::Shipped, OrderStatus::Completed))
}

/// Order-level status transitions.
///
/// Sellers never touch order status (they only mark items sent); customers
/// get exactly one transition; admins get a free-form, audited override.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Customer confirms receipt: `shipped → completed`, rejected from any
    /// other status.
    #[instrument(skip(self), fields(order_number = %number, user_id = %principal.user_id))]
    pub async fn confirm_receipt(
        &self,
        principal: &Principal,
        number: &str,
    ) -> Result<order::Model, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {number} not found")))?;

        if !permissions::can_confirm_receipt(principal, &order) {
            return Err(ServiceError::Forbidden(
                "only the order's owner can confirm receipt".to_string(),
            ));
        }

        if !customer_may_transition(order.status, OrderStatus::Completed) {
            return Err(ServiceError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Completed.to_string(),
            });
        }

        self.write_status(order, OrderStatus::Completed).await
    }

    /// Admin sets any status directly. Moving a terminal order is allowed as
    /// an operational correction but leaves an audit trail in the log.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn admin_set_status(
        &self,
        principal: &Principal,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        if !permissions::can_override_order(principal) {
            return Err(ServiceError::Forbidden(
                "admin access required".to_string(),
            ));
        }

        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        if order.status == new_status {
            return Ok(order);
        }

        if order.status.is_terminal() {
            warn!(
                order_id = %order.id,
                order_number = %order.order_number,
                admin_id = %principal.user_id,
                from = %order.status,
                to = %new_status,
                "admin override moves an order out of a terminal status"
            );
        }

        self.write_status(order, new_status).await
    }

    async fn write_status(
        &self,
        order: order::Model,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order_id = order.id;
        let old_status = order.status;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(%order_id, %old_status, %new_status, "order status updated");

        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        Ok(updated)
    }
}
