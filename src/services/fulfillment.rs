use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{permissions, Principal};
use crate::entities::{
    order_item::{self, Entity as OrderItemEntity},
    product::Entity as ProductEntity,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Per-item fulfillment flag, deliberately decoupled from order-level status:
/// the engine never synchronizes the two, the UI reconciles them.
#[derive(Clone)]
pub struct FulfillmentService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl FulfillmentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Mark one item as sent. Idempotent: an already-sent item returns Ok
    /// without a write.
    ///
    /// Only the seller owning the referenced product (or an admin) may flip
    /// the flag. When the product row is gone, ownership can no longer be
    /// established and only admins may act.
    #[instrument(skip(self), fields(item_id = %item_id, user_id = %principal.user_id))]
    pub async fn mark_item_sent(
        &self,
        principal: &Principal,
        item_id: Uuid,
    ) -> Result<order_item::Model, ServiceError> {
        let item = OrderItemEntity::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order item {item_id} not found")))?;

        let product = ProductEntity::find_by_id(item.product_id).one(&*self.db).await?;

        let authorized = match product {
            Some(ref p) => permissions::can_mark_item_sent(principal, p.seller_id),
            None => principal.is_admin,
        };
        if !authorized {
            return Err(ServiceError::Forbidden(
                "only the item's seller can mark it sent".to_string(),
            ));
        }

        if item.is_send {
            return Ok(item);
        }

        let order_id = item.order_id;
        let mut active: order_item::ActiveModel = item.into();
        active.is_send = Set(true);
        let updated = active.update(&*self.db).await?;

        info!(item_id = %updated.id, order_id = %order_id, "order item marked sent");

        self.event_sender
            .send(Event::OrderItemMarkedSent {
                order_id,
                item_id: updated.id,
                seller_id: principal.user_id,
            })
            .await;

        Ok(updated)
    }

    /// Mark all of the seller's items in an order as sent. Returns the items
    /// that belong to the seller after the update; an order containing none
    /// of the seller's products is a `Forbidden`.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %principal.user_id))]
    pub async fn mark_seller_items_sent(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let rows = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .find_also_related(ProductEntity)
            .all(&*self.db)
            .await?;

        if rows.is_empty() {
            return Err(ServiceError::NotFound(format!("Order {order_id} not found")));
        }

        let own: Vec<order_item::Model> = rows
            .into_iter()
            .filter_map(|(item, product)| match product {
                Some(p) if permissions::can_mark_item_sent(principal, p.seller_id) => Some(item),
                None if principal.is_admin => Some(item),
                _ => None,
            })
            .collect();

        if own.is_empty() {
            return Err(ServiceError::Forbidden(
                "no items from this seller in the order".to_string(),
            ));
        }

        let mut updated = Vec::with_capacity(own.len());
        for item in own {
            if item.is_send {
                updated.push(item);
                continue;
            }
            let item_id = item.id;
            let mut active: order_item::ActiveModel = item.into();
            active.is_send = Set(true);
            let model = active.update(&*self.db).await?;

            self.event_sender
                .send(Event::OrderItemMarkedSent {
                    order_id,
                    item_id,
                    seller_id: principal.user_id,
                })
                .await;

            updated.push(model);
        }

        Ok(updated)
    }
}
