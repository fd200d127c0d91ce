#![allow(dead_code)] // each test binary uses a subset of these helpers

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use marketplace_api::{
    auth::Principal,
    db::{self, DbConfig},
    entities::{product, user},
    events::{self, EventSender},
    handlers::AppServices,
};

/// Test harness backed by a throwaway SQLite database.
///
/// A single pooled connection keeps SQLite happy under concurrent tasks; the
/// uniqueness properties the engine relies on are enforced by the same schema
/// the production bootstrap creates.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    _event_task: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_commission(Decimal::ZERO).await
    }

    pub async fn with_commission(default_commission: Decimal) -> Self {
        let tmp = TempDir::new().expect("create temp dir for test database");
        let db_path = tmp.path().join("marketplace_test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let cfg = DbConfig {
            url,
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };

        let pool = db::establish_connection_with_config(&cfg)
            .await
            .expect("failed to create test database");
        db::ensure_schema(&pool)
            .await
            .expect("failed to bootstrap test schema");

        let db = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db.clone(), event_sender, default_commission);

        Self {
            db,
            services,
            _event_task: event_task,
            _tmp: tmp,
        }
    }

    /// Insert a user and return the matching principal.
    pub async fn seed_user(&self, role: user::Role, is_admin: bool) -> (user::Model, Principal) {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let model = user::ActiveModel {
            id: Set(id),
            email: Set(format!("user-{id}@example.com")),
            full_name: Set("Test User".to_string()),
            role: Set(role),
            is_admin: Set(is_admin),
            is_verify: Set(false),
            verification_status: Set(None),
            seller_type: Set(None),
            phone: Set(None),
            inn: Set(None),
            company_name: Set(None),
            address: Set(None),
            passport_number: Set(None),
            passport_issued_by: Set(None),
            passport_issue_date: Set(None),
            verification_rejection_reason: Set(None),
            verification_requested_at: Set(None),
            verification_approved_at: Set(None),
            verification_rejected_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed user");

        let principal = Principal::new(model.id, model.role, model.is_admin);
        (model, principal)
    }

    pub async fn seed_customer(&self) -> (user::Model, Principal) {
        self.seed_user(user::Role::Customer, false).await
    }

    pub async fn seed_seller(&self) -> (user::Model, Principal) {
        self.seed_user(user::Role::Seller, false).await
    }

    pub async fn seed_admin(&self) -> (user::Model, Principal) {
        self.seed_user(user::Role::Customer, true).await
    }

    pub async fn seed_product(&self, seller_id: Uuid, price: Decimal) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            seller_id: Set(seller_id),
            name: Set("Test Product".to_string()),
            price: Set(price),
            is_published: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }
}

/// Shipping snapshot used across order tests.
pub fn shipping() -> marketplace_api::services::orders::ShippingDetails {
    marketplace_api::services::orders::ShippingDetails {
        full_name: "Ivan Petrov".to_string(),
        email: "ivan@example.com".to_string(),
        phone: "+79990001122".to_string(),
        address: "Moscow, Tverskaya 1".to_string(),
    }
}
