use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Marketplace account. Only the seller-verification subset is modeled here;
/// credentials and session issuance live in the auth collaborator.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub is_admin: bool,
    /// Gate that unlocks seller-only capabilities. Distinct from `role`: a
    /// lapsed seller can regain `role = seller` without re-review while this
    /// stays true from the original approval.
    pub is_verify: bool,
    #[sea_orm(nullable)]
    pub verification_status: Option<VerificationStatus>,
    #[sea_orm(nullable)]
    pub seller_type: Option<SellerType>,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    /// Tax identifier for company sellers. Unique where present.
    #[sea_orm(nullable)]
    pub inn: Option<String>,
    #[sea_orm(nullable)]
    pub company_name: Option<String>,
    #[sea_orm(nullable)]
    pub address: Option<String>,
    #[sea_orm(nullable)]
    pub passport_number: Option<String>,
    #[sea_orm(nullable)]
    pub passport_issued_by: Option<String>,
    #[sea_orm(nullable)]
    pub passport_issue_date: Option<NaiveDate>,
    #[sea_orm(nullable)]
    pub verification_rejection_reason: Option<String>,
    #[sea_orm(nullable)]
    pub verification_requested_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub verification_approved_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub verification_rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(has_one = "super::cart::Entity")]
    Cart,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Account role. Orthogonal to `is_admin`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "customer")]
    Customer,
    #[sea_orm(string_value = "seller")]
    Seller,
}

/// Seller-application review state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SellerType {
    #[sea_orm(string_value = "individual")]
    Individual,
    #[sea_orm(string_value = "company")]
    Company,
}
