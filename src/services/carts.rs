use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::Serialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{
    cart::{self, Entity as CartEntity},
    cart_item::{self, Entity as CartItemEntity},
    product::Entity as ProductEntity,
};
use crate::errors::ServiceError;
use crate::services::orders::OrderLine;

/// A cart line joined with its product for display.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub items: Vec<CartItemView>,
    pub subtotal: Decimal,
}

/// Shopping cart operations. The cart is ephemeral per-customer state; order
/// creation empties it as a best-effort follow-up step.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn get_or_create(&self, user_id: Uuid) -> Result<cart::Model, ServiceError> {
        let existing = CartEntity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        if let Some(cart) = existing {
            return Ok(cart);
        }

        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        Ok(cart)
    }

    /// The customer's cart with product names and current prices.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn view(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create(user_id).await?;
        let rows = cart
            .find_related(CartItemEntity)
            .find_also_related(ProductEntity)
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut subtotal = Decimal::ZERO;
        for (item, product) in rows {
            let (name, price) = match product {
                Some(p) => (p.name, p.price),
                // product removed from the catalog since it was added
                None => ("unavailable".to_string(), Decimal::ZERO),
            };
            subtotal += price * Decimal::from(item.quantity);
            items.push(CartItemView {
                id: item.id,
                product_id: item.product_id,
                product_name: name,
                unit_price: price,
                quantity: item.quantity,
            });
        }

        Ok(CartView {
            id: cart.id,
            items,
            subtotal,
        })
    }

    /// Add a product to the cart, merging quantity when already present.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::invalid_field(
                "quantity",
                "quantity must be a positive integer",
            ));
        }

        let product = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

        if !product.is_published {
            return Err(ServiceError::NotFound(format!(
                "Product {product_id} not found"
            )));
        }

        let cart = self.get_or_create(user_id).await?;
        let now = Utc::now();

        let existing = CartItemEntity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        match existing {
            Some(item) => {
                let merged = item.quantity + quantity;
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(merged);
                active.updated_at = Set(now);
                active.update(&*self.db).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?;
            }
        }

        self.view(user_id).await
    }

    /// Set the quantity of an existing cart line.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::invalid_field(
                "quantity",
                "quantity must be a positive integer",
            ));
        }

        let cart = self.get_or_create(user_id).await?;
        let item = CartItemEntity::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {item_id} not found")))?;

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.view(user_id).await
    }

    /// Remove a line from the cart.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create(user_id).await?;
        let item = CartItemEntity::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {item_id} not found")))?;

        item.delete(&*self.db).await?;
        self.view(user_id).await
    }

    /// Empty the cart. Idempotent; called after successful order creation.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let cart = CartEntity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        if let Some(cart) = cart {
            let deleted = CartItemEntity::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&*self.db)
                .await?;
            if deleted.rows_affected > 0 {
                info!(user_id = %user_id, count = deleted.rows_affected, "cart emptied");
            }
        }

        Ok(())
    }

    /// Convert the cart into order lines priced from the current catalog.
    /// Lines whose product has disappeared or been unpublished are rejected
    /// so checkout fails loudly instead of ordering a ghost product.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn order_lines(&self, user_id: Uuid) -> Result<Vec<OrderLine>, ServiceError> {
        let cart = self.get_or_create(user_id).await?;
        let rows = cart
            .find_related(CartItemEntity)
            .find_also_related(ProductEntity)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for (item, product) in rows {
            let product = product.filter(|p| p.is_published).ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} is no longer available",
                    item.product_id
                ))
            })?;
            lines.push(OrderLine {
                product_id: product.id,
                quantity: item.quantity,
                unit_price: product.price,
            });
        }

        Ok(lines)
    }
}
