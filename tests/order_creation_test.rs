//! Order creation transaction: totals, numbering, atomicity and cart
//! clearing.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{shipping, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use marketplace_api::{
    entities::{order, order_item},
    errors::ServiceError,
    services::order_number,
    services::orders::{CreateOrderInput, OrderLine},
};

fn input_for(lines: Vec<OrderLine>) -> CreateOrderInput {
    CreateOrderInput {
        lines,
        shipping: shipping(),
        payment_reference: Some("pay_test_ref".to_string()),
        paid: true,
    }
}

#[tokio::test]
async fn order_totals_include_commission() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(1000)).await;

    let created = app
        .services
        .orders
        .create_order(
            &customer,
            input_for(vec![OrderLine {
                product_id: product.id,
                quantity: 2,
                unit_price: dec!(1000),
            }]),
            dec!(5),
        )
        .await
        .expect("create order");

    // subtotal 2000, commission 100, total 2100
    assert_eq!(created.order.total_amount, dec!(2100));
    assert_eq!(created.order.status, order::OrderStatus::Pending);
    assert!(created.order.paid);
    assert_eq!(
        created.order.payment_reference.as_deref(),
        Some("pay_test_ref")
    );

    assert_eq!(created.items.len(), 1);
    let item = &created.items[0];
    assert_eq!(item.price, dec!(1000));
    assert_eq!(item.quantity, 2);
    assert!(!item.is_send);
}

#[tokio::test]
async fn order_numbers_increment_within_the_day() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(10)).await;

    let line = || {
        vec![OrderLine {
            product_id: product.id,
            quantity: 1,
            unit_price: dec!(10),
        }]
    };

    let first = app
        .services
        .orders
        .create_order(&customer, input_for(line()), dec!(0))
        .await
        .unwrap();
    let second = app
        .services
        .orders
        .create_order(&customer, input_for(line()), dec!(0))
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let prefix = order_number::day_prefix(today);
    assert_eq!(first.order.order_number, format!("{prefix}0001"));
    assert_eq!(second.order.order_number, format!("{prefix}0002"));
}

#[tokio::test]
async fn sequence_restarts_each_day() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(10)).await;

    // An order from yesterday with a high sequence must not leak into today.
    let yesterday = (Utc::now() - Duration::days(1)).date_naive();
    let now = Utc::now();
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(order_number::format_number(yesterday, 42)),
        user_id: Set(customer.user_id),
        status: Set(order::OrderStatus::Pending),
        full_name: Set("Old".to_string()),
        email: Set("old@example.com".to_string()),
        phone: Set("+70000000000".to_string()),
        address: Set("Old street".to_string()),
        total_amount: Set(dec!(10)),
        payment_reference: Set(None),
        paid: Set(false),
        tracking_number: Set(None),
        notes: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*app.db)
    .await
    .unwrap();

    let created = app
        .services
        .orders
        .create_order(
            &customer,
            input_for(vec![OrderLine {
                product_id: product.id,
                quantity: 1,
                unit_price: dec!(10),
            }]),
            dec!(0),
        )
        .await
        .unwrap();

    let prefix = order_number::day_prefix(Utc::now().date_naive());
    assert_eq!(created.order.order_number, format!("{prefix}0001"));
}

#[tokio::test]
async fn concurrent_creations_get_distinct_gapless_numbers() {
    let app = TestApp::new().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(25)).await;

    const N: usize = 20;
    let mut handles = Vec::with_capacity(N);
    for _ in 0..N {
        let services = app.services.clone();
        let (_, customer) = app.seed_customer().await;
        let product_id = product.id;
        handles.push(tokio::spawn(async move {
            services
                .orders
                .create_order(
                    &customer,
                    CreateOrderInput {
                        lines: vec![OrderLine {
                            product_id,
                            quantity: 1,
                            unit_price: dec!(25),
                        }],
                        shipping: shipping(),
                        payment_reference: None,
                        paid: false,
                    },
                    dec!(0),
                )
                .await
        }));
    }

    let mut numbers = Vec::with_capacity(N);
    for handle in handles {
        let created = handle.await.unwrap().expect("concurrent creation");
        numbers.push(created.order.order_number);
    }

    let prefix = order_number::day_prefix(Utc::now().date_naive());
    let mut suffixes: Vec<u32> = numbers
        .iter()
        .map(|n| order_number::parse_sequence(n, &prefix).expect("well-formed number"))
        .collect();
    suffixes.sort_unstable();

    let distinct: std::collections::HashSet<&String> = numbers.iter().collect();
    assert_eq!(distinct.len(), N, "every order got a unique number");
    assert_eq!(
        suffixes,
        (1..=N as u32).collect::<Vec<_>>(),
        "suffixes are gapless starting at 0001"
    );
}

#[tokio::test]
async fn price_mismatch_rejects_and_persists_nothing() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(100)).await;

    let err = app
        .services
        .orders
        .create_order(
            &customer,
            input_for(vec![OrderLine {
                product_id: product.id,
                quantity: 1,
                unit_price: dec!(80),
            }]),
            dec!(0),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PriceMismatch { expected, submitted, .. } => {
        assert_eq!(expected, dec!(100));
        assert_eq!(submitted, dec!(80));
    });

    let orders = order::Entity::find().count(&*app.db).await.unwrap();
    let items = order_item::Entity::find().count(&*app.db).await.unwrap();
    assert_eq!(orders, 0, "no order row may survive a failed creation");
    assert_eq!(items, 0, "no item rows may survive a failed creation");
}

#[tokio::test]
async fn mixed_valid_and_mismatched_lines_leave_no_partial_order() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, seller) = app.seed_seller().await;
    let good = app.seed_product(seller.user_id, dec!(50)).await;
    let drifted = app.seed_product(seller.user_id, dec!(75)).await;

    let err = app
        .services
        .orders
        .create_order(
            &customer,
            input_for(vec![
                OrderLine {
                    product_id: good.id,
                    quantity: 1,
                    unit_price: dec!(50),
                },
                OrderLine {
                    product_id: drifted.id,
                    quantity: 1,
                    unit_price: dec!(60),
                },
            ]),
            dec!(0),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PriceMismatch { .. });
    assert_eq!(order::Entity::find().count(&*app.db).await.unwrap(), 0);
    assert_eq!(order_item::Entity::find().count(&*app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn empty_item_list_is_rejected() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;

    let err = app
        .services
        .orders
        .create_order(&customer, input_for(vec![]), dec!(0))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationFailed(fields) => {
        assert!(fields.iter().any(|f| f.field == "items"));
    });
}

#[tokio::test]
async fn unknown_product_is_rejected() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;

    let err = app
        .services
        .orders
        .create_order(
            &customer,
            input_for(vec![OrderLine {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: dec!(10),
            }]),
            dec!(0),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn cart_is_emptied_after_successful_creation() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(30)).await;

    app.services
        .carts
        .add_item(customer.user_id, product.id, 3)
        .await
        .unwrap();

    let lines = app
        .services
        .carts
        .order_lines(customer.user_id)
        .await
        .unwrap();
    app.services
        .orders
        .create_order(&customer, input_for(lines), dec!(0))
        .await
        .unwrap();

    let cart = app.services.carts.view(customer.user_id).await.unwrap();
    assert!(cart.items.is_empty(), "cart must be emptied after checkout");
}

#[tokio::test]
async fn commission_change_does_not_rewrite_existing_orders() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(200)).await;

    app.services
        .settings
        .set_commission_percent(dec!(10))
        .await
        .unwrap();
    let commission = app.services.settings.commission_percent().await.unwrap();

    let created = app
        .services
        .orders
        .create_order(
            &customer,
            input_for(vec![OrderLine {
                product_id: product.id,
                quantity: 1,
                unit_price: dec!(200),
            }]),
            commission,
        )
        .await
        .unwrap();
    assert_eq!(created.order.total_amount, dec!(220));

    app.services
        .settings
        .set_commission_percent(dec!(50))
        .await
        .unwrap();

    let stored = order::Entity::find()
        .filter(order::Column::Id.eq(created.order.id))
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.total_amount,
        dec!(220),
        "historical totals never follow settings changes"
    );
}

#[tokio::test]
async fn item_keeps_snapshot_when_product_is_deleted() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(15)).await;

    let created = app
        .services
        .orders
        .create_order(
            &customer,
            input_for(vec![OrderLine {
                product_id: product.id,
                quantity: 1,
                unit_price: dec!(15),
            }]),
            dec!(0),
        )
        .await
        .unwrap();

    marketplace_api::entities::product::Entity::delete_by_id(product.id)
        .exec(&*app.db)
        .await
        .unwrap();

    let fetched = app
        .services
        .orders
        .get_by_number(&customer, &created.order.order_number)
        .await
        .unwrap();

    let item = &fetched.items[0];
    assert!(!item.product_available);
    assert_eq!(item.price, dec!(15), "snapshot price survives deletion");
    assert_eq!(item.product_name, "Test Product");
}

#[tokio::test]
async fn strangers_cannot_read_foreign_orders() {
    let app = TestApp::new().await;
    let (_, customer) = app.seed_customer().await;
    let (_, stranger) = app.seed_customer().await;
    let (_, admin) = app.seed_admin().await;
    let (_, seller) = app.seed_seller().await;
    let product = app.seed_product(seller.user_id, dec!(10)).await;

    let created = app
        .services
        .orders
        .create_order(
            &customer,
            input_for(vec![OrderLine {
                product_id: product.id,
                quantity: 1,
                unit_price: dec!(10),
            }]),
            dec!(0),
        )
        .await
        .unwrap();

    let err = app
        .services
        .orders
        .get_by_number(&stranger, &created.order.order_number)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    // the admin can read anything
    app.services
        .orders
        .get_by_number(&admin, &created.order.order_number)
        .await
        .expect("admin access");
}
