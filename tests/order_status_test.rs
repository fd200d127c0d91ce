//! Order status state machine: customer receipt confirmation and the audited
//! admin override.

mod common;

use assert_matches::assert_matches;
use common::{shipping, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;

use marketplace_api::{
    auth::Principal,
    entities::order::{Entity as OrderEntity, OrderStatus},
    errors::ServiceError,
    services::orders::{CreateOrderInput, OrderLine},
};

struct Scenario {
    app: TestApp,
    customer: Principal,
    admin: Principal,
    order_id: uuid::Uuid,
    order_number: String,
}

async fn scenario() -> Scenario {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, admin) = app.seed_admin().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(40)).await;

    let created = app
        .services
        .orders
        .create_order(
            &customer,
            CreateOrderInput {
                lines: vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                    unit_price: dec!(40),
                }],
                shipping: shipping(),
                payment_reference: None,
                paid: false,
            },
            dec!(0),
        )
        .await
        .expect("create order");

    Scenario {
        app,
        customer,
        admin,
        order_id: created.order.id,
        order_number: created.order.order_number,
    }
}

#[tokio::test]
async fn customer_confirms_receipt_of_shipped_order() {
    let s = scenario().await;

    s.app
        .services
        .order_status
        .admin_set_status(&s.admin, s.order_id, OrderStatus::Shipped)
        .await
        .unwrap();

    let completed = s
        .app
        .services
        .order_status
        .confirm_receipt(&s.customer, &s.order_number)
        .await
        .unwrap();

    assert_eq!(completed.status, OrderStatus::Completed);
}

#[tokio::test]
async fn pending_order_cannot_be_confirmed_and_stays_pending() {
    let s = scenario().await;

    let err = s
        .app
        .services
        .order_status
        .confirm_receipt(&s.customer, &s.order_number)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InvalidTransition { from, to } => {
        assert_eq!(from, "pending");
        assert_eq!(to, "completed");
    });

    let stored = OrderEntity::find_by_id(s.order_id)
        .one(&*s.app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.status,
        OrderStatus::Pending,
        "a rejected transition must not change status"
    );
}

#[tokio::test]
async fn only_the_owner_confirms_receipt() {
    let s = scenario().await;
    let (_, stranger) = s.app.seed_customer().await;

    s.app
        .services
        .order_status
        .admin_set_status(&s.admin, s.order_id, OrderStatus::Shipped)
        .await
        .unwrap();

    let err = s
        .app
        .services
        .order_status
        .confirm_receipt(&stranger, &s.order_number)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn admin_walks_the_full_lifecycle() {
    let s = scenario().await;

    for status in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
    ] {
        let updated = s
            .app
            .services
            .order_status
            .admin_set_status(&s.admin, s.order_id, status)
            .await
            .unwrap();
        assert_eq!(updated.status, status);
    }
}

#[tokio::test]
async fn admin_override_can_reopen_a_terminal_order() {
    let s = scenario().await;

    s.app
        .services
        .order_status
        .admin_set_status(&s.admin, s.order_id, OrderStatus::Cancelled)
        .await
        .unwrap();

    // operational correction: the override is allowed and audited
    let reopened = s
        .app
        .services
        .order_status
        .admin_set_status(&s.admin, s.order_id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(reopened.status, OrderStatus::Processing);
}

#[tokio::test]
async fn non_admin_cannot_override_status() {
    let s = scenario().await;
    let (_, seller) = s.app.seed_seller().await;

    for principal in [&s.customer, &seller] {
        let err = s
            .app
            .services
            .order_status
            .admin_set_status(principal, s.order_id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Forbidden(_));
    }
}

#[tokio::test]
async fn admin_updates_tracking_and_notes_without_touching_status() {
    let s = scenario().await;

    let updated = s
        .app
        .services
        .orders
        .admin_update(
            &s.admin,
            s.order_id,
            marketplace_api::services::orders::AdminOrderUpdate {
                tracking_number: Some("RA123456789RU".to_string()),
                notes: Some("fragile".to_string()),
                paid: Some(true),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.tracking_number.as_deref(), Some("RA123456789RU"));
    assert_eq!(updated.notes.as_deref(), Some("fragile"));
    assert!(updated.paid);
    assert_eq!(updated.status, OrderStatus::Pending);
}
