use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{permissions, Principal};
use crate::entities::{
    order::{self, Entity as OrderEntity, OrderStatus},
    order_item::{self, Entity as OrderItemEntity},
    product::{self, Entity as ProductEntity},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::carts::CartService;
use crate::services::order_number::{self, MAX_ALLOCATION_ATTEMPTS};
use crate::services::pricing::{self, LineAmount};

/// One line of an order to be created. `unit_price` comes from the caller's
/// catalog read and is re-validated against the live product row before the
/// order is persisted.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Shipping snapshot captured at checkout. Copied onto the order, never
/// live-linked to the profile.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ShippingDetails {
    #[validate(length(min = 1, message = "full name is required"))]
    pub full_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    pub lines: Vec<OrderLine>,
    #[validate]
    pub shipping: ShippingDetails,
    /// Opaque reference from the payment collaborator.
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub paid: bool,
}

/// A created or fetched order together with its line items.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub is_send: bool,
    /// False when the referenced product has since left the catalog; the
    /// item's own snapshot keeps the history renderable.
    pub product_available: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderListPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Admin-editable order details. Status changes go through the status state
/// machine, not through here.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AdminOrderUpdate {
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub paid: Option<bool>,
}

/// Order creation and retrieval.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    carts: CartService,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, carts: CartService) -> Self {
        Self {
            db,
            event_sender,
            carts,
        }
    }

    /// Create an order atomically: price re-validation, commission totals,
    /// order number allocation, order row and line items all commit together
    /// or not at all.
    ///
    /// The order number read is optimistic; when the insert loses the
    /// same-day race the whole transaction is retried with a fresh read, up
    /// to a bounded attempt count. Retrying the full transaction keeps the
    /// price snapshot and the allocated number consistent with each other.
    #[instrument(skip(self, input), fields(user_id = %principal.user_id))]
    pub async fn create_order(
        &self,
        principal: &Principal,
        input: CreateOrderInput,
        commission_percent: Decimal,
    ) -> Result<OrderWithItems, ServiceError> {
        input.validate().map_err(ServiceError::from)?;

        if input.lines.is_empty() {
            return Err(ServiceError::invalid_field(
                "items",
                "cart is empty: at least one item is required",
            ));
        }

        let mut last_conflict: Option<String> = None;

        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let txn = self.db.begin().await?;

            match self
                .try_create(&txn, principal, &input, commission_percent)
                .await
            {
                Ok(created) => match txn.commit().await {
                    Ok(()) => {
                        info!(
                            order_id = %created.order.id,
                            order_number = %created.order.order_number,
                            attempt,
                            "order created"
                        );

                        self.event_sender
                            .send(Event::OrderCreated {
                                order_id: created.order.id,
                                order_number: created.order.order_number.clone(),
                                user_id: principal.user_id,
                            })
                            .await;

                        // Best-effort follow-up outside the transaction:
                        // clearing again on a retried request is a no-op.
                        if let Err(e) = self.carts.clear(principal.user_id).await {
                            warn!(error = %e, user_id = %principal.user_id, "failed to clear cart after order creation");
                        }

                        return Ok(created);
                    }
                    Err(e) if is_unique_violation(&e) => {
                        last_conflict = Some(e.to_string());
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
                Err(CreateAttemptError::NumberTaken(detail)) => {
                    txn.rollback().await.ok();
                    last_conflict = Some(detail);
                    continue;
                }
                Err(CreateAttemptError::Fatal(e)) => {
                    txn.rollback().await.ok();
                    return Err(e);
                }
            }
        }

        error!(
            user_id = %principal.user_id,
            attempts = MAX_ALLOCATION_ATTEMPTS,
            "order number allocation kept colliding"
        );
        Err(ServiceError::Conflict(format!(
            "could not allocate a unique order number after {MAX_ALLOCATION_ATTEMPTS} attempts{}",
            last_conflict
                .map(|d| format!(" (last error: {d})"))
                .unwrap_or_default()
        )))
    }

    async fn try_create(
        &self,
        txn: &DatabaseTransaction,
        principal: &Principal,
        input: &CreateOrderInput,
        commission_percent: Decimal,
    ) -> Result<OrderWithItems, CreateAttemptError> {
        // Defensive re-validation of caller-supplied prices against the
        // catalog, so a stale cart cannot buy at an outdated price.
        let mut snapshots = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let product = ProductEntity::find_by_id(line.product_id)
                .one(txn)
                .await
                .map_err(|e| CreateAttemptError::Fatal(e.into()))?
                .filter(|p| p.is_published)
                .ok_or_else(|| {
                    CreateAttemptError::Fatal(ServiceError::NotFound(format!(
                        "Product {} not found",
                        line.product_id
                    )))
                })?;

            if product.price != line.unit_price {
                return Err(CreateAttemptError::Fatal(ServiceError::PriceMismatch {
                    product_id: product.id,
                    expected: product.price,
                    submitted: line.unit_price,
                }));
            }

            snapshots.push((line, product.name.clone()));
        }

        let amounts: Vec<LineAmount> = input
            .lines
            .iter()
            .map(|l| LineAmount {
                unit_price: l.unit_price,
                quantity: l.quantity,
            })
            .collect();
        let totals =
            pricing::quote(&amounts, commission_percent).map_err(CreateAttemptError::Fatal)?;

        let today = Utc::now().date_naive();
        let number = order_number::next_number(txn, today)
            .await
            .map_err(CreateAttemptError::Fatal)?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let inserted = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(number.clone()),
            user_id: Set(principal.user_id),
            status: Set(OrderStatus::Pending),
            full_name: Set(input.shipping.full_name.clone()),
            email: Set(input.shipping.email.clone()),
            phone: Set(input.shipping.phone.clone()),
            address: Set(input.shipping.address.clone()),
            total_amount: Set(totals.total),
            payment_reference: Set(input.payment_reference.clone()),
            paid: Set(input.paid),
            tracking_number: Set(None),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await;

        let order = match inserted {
            Ok(order) => order,
            Err(e) if is_unique_violation(&e) => {
                return Err(CreateAttemptError::NumberTaken(e.to_string()));
            }
            Err(e) => return Err(CreateAttemptError::Fatal(e.into())),
        };

        let mut items = Vec::with_capacity(snapshots.len());
        for (line, product_name) in snapshots {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                product_name: Set(product_name),
                quantity: Set(line.quantity),
                price: Set(line.unit_price),
                is_send: Set(false),
            }
            .insert(txn)
            .await
            .map_err(|e| CreateAttemptError::Fatal(e.into()))?;

            items.push(OrderItemView {
                id: item.id,
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                price: item.price,
                is_send: item.is_send,
                product_available: true,
            });
        }

        Ok(OrderWithItems { order, items })
    }

    /// Fetch an order by its human-facing number. Owner or admin only.
    #[instrument(skip(self), fields(order_number = %number))]
    pub async fn get_by_number(
        &self,
        principal: &Principal,
        number: &str,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {number} not found")))?;

        if !permissions::can_view_order(principal, &order) {
            return Err(ServiceError::Forbidden(
                "you do not have access to this order".to_string(),
            ));
        }

        let items = self.load_items(&order).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Orders visible to the principal: admins see every order, customers
    /// their own.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        principal: &Principal,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListPage, ServiceError> {
        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if !principal.is_admin {
            query = query.filter(order::Column::UserId.eq(principal.user_id));
        }

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderListPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Orders containing at least one of the seller's products, with foreign
    /// sellers' items filtered out of each order.
    #[instrument(skip(self), fields(seller_id = %principal.user_id))]
    pub async fn list_for_seller(
        &self,
        principal: &Principal,
    ) -> Result<Vec<OrderWithItems>, ServiceError> {
        use crate::entities::user::Role;

        if !(principal.is_admin || principal.role == Role::Seller) {
            return Err(ServiceError::Forbidden(
                "only sellers can access their sales".to_string(),
            ));
        }

        let product_ids: Vec<Uuid> = ProductEntity::find()
            .filter(product::Column::SellerId.eq(principal.user_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = OrderItemEntity::find()
            .filter(order_item::Column::ProductId.is_in(product_ids))
            .all(&*self.db)
            .await?;

        let mut order_ids: Vec<Uuid> = items.iter().map(|i| i.order_id).collect();
        order_ids.sort_unstable();
        order_ids.dedup();

        let orders = OrderEntity::find()
            .filter(order::Column::Id.is_in(order_ids))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let own_items: Vec<OrderItemView> = items
                .iter()
                .filter(|i| i.order_id == order.id)
                .map(|i| OrderItemView {
                    id: i.id,
                    product_id: i.product_id,
                    product_name: i.product_name.clone(),
                    quantity: i.quantity,
                    price: i.price,
                    is_send: i.is_send,
                    product_available: true,
                })
                .collect();
            result.push(OrderWithItems {
                order,
                items: own_items,
            });
        }

        Ok(result)
    }

    /// Admin edit of operational details (tracking number, notes, paid flag).
    #[instrument(skip(self, update), fields(order_id = %order_id))]
    pub async fn admin_update(
        &self,
        principal: &Principal,
        order_id: Uuid,
        update: AdminOrderUpdate,
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

        let mut active: order::ActiveModel = order.into();
        if let Some(tracking) = update.tracking_number {
            active.tracking_number = Set(Some(tracking));
        }
        if let Some(notes) = update.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(paid) = update.paid {
            active.paid = Set(paid);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        Ok(updated)
    }

    async fn load_items(&self, order: &order::Model) -> Result<Vec<OrderItemView>, ServiceError> {
        let rows = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .find_also_related(ProductEntity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(item, product)| OrderItemView {
                id: item.id,
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                price: item.price,
                is_send: item.is_send,
                product_available: product.is_some(),
            })
            .collect())
    }
}

enum CreateAttemptError {
    /// The allocated order number was taken by a concurrent writer; retry
    /// with a fresh sequence read.
    NumberTaken(String),
    /// Anything else aborts creation immediately.
    Fatal(ServiceError),
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
