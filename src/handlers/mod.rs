pub mod carts;
pub mod fulfillment;
pub mod health;
pub mod orders;
pub mod settings;
pub mod verification;

use std::sync::Arc;

use axum::Router;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

use crate::events::EventSender;
use crate::services::{
    CartService, FulfillmentService, OrderService, OrderStatusService, SettingsService,
    VerificationService,
};
use crate::AppState;

/// Aggregated services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub fulfillment: Arc<FulfillmentService>,
    pub carts: Arc<CartService>,
    pub verification: Arc<VerificationService>,
    pub settings: Arc<SettingsService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        default_commission: Decimal,
    ) -> Self {
        let carts = CartService::new(db.clone());
        Self {
            orders: Arc::new(OrderService::new(
                db.clone(),
                event_sender.clone(),
                carts.clone(),
            )),
            order_status: Arc::new(OrderStatusService::new(db.clone(), event_sender.clone())),
            fulfillment: Arc::new(FulfillmentService::new(db.clone(), event_sender.clone())),
            carts: Arc::new(carts),
            verification: Arc::new(VerificationService::new(db.clone(), event_sender)),
            settings: Arc::new(SettingsService::new(db, default_commission)),
        }
    }
}

/// All API routes, nested under `/api/v1` by the caller.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(orders::routes())
        .merge(carts::routes())
        .merge(fulfillment::routes())
        .merge(verification::routes())
        .merge(settings::routes())
}
