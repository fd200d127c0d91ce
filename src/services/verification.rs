use std::sync::Arc;

use chrono::{Months, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::{permissions, Principal};
use crate::entities::user::{self, Entity as UserEntity, Role, SellerType, VerificationStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

static INN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10,12}$").expect("valid INN regex"));

fn validate_inn(inn: &str) -> Result<(), ValidationError> {
    if INN_RE.is_match(inn) {
        return Ok(());
    }
    let mut err = ValidationError::new("inn_format");
    err.message = Some("INN must be 10 to 12 digits".into());
    Err(err)
}

fn validate_passport_issue_date(date: &NaiveDate) -> Result<(), ValidationError> {
    let today = Utc::now().date_naive();
    if *date > today {
        let mut err = ValidationError::new("issue_date_future");
        err.message = Some("passport issue date must not be in the future".into());
        return Err(err);
    }
    let oldest = today
        .checked_sub_months(Months::new(1200))
        .unwrap_or(NaiveDate::MIN);
    if *date < oldest {
        let mut err = ValidationError::new("issue_date_expired");
        err.message = Some("passport issue date must not be older than 100 years".into());
        return Err(err);
    }
    Ok(())
}

/// Individual seller application details.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct IndividualApplication {
    #[validate(length(min = 6, message = "passport number must be at least 6 characters"))]
    pub passport_number: String,
    #[validate(length(min = 1, message = "passport issuer is required"))]
    pub passport_issued_by: String,
    #[validate(custom = "validate_passport_issue_date")]
    pub passport_issue_date: NaiveDate,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
}

/// Company seller application details.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CompanyApplication {
    #[validate(custom = "validate_inn")]
    pub inn: String,
    #[validate(length(min = 1, message = "company name is required"))]
    pub company_name: String,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
}

/// A seller application, individual or company.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "seller_type", rename_all = "snake_case")]
pub enum SellerApplication {
    Individual(IndividualApplication),
    Company(CompanyApplication),
}

impl SellerApplication {
    pub fn seller_type(&self) -> SellerType {
        match self {
            SellerApplication::Individual(_) => SellerType::Individual,
            SellerApplication::Company(_) => SellerType::Company,
        }
    }

    /// Field-level validation gates that every (re)submission must pass.
    pub fn validate_fields(&self) -> Result<(), ServiceError> {
        match self {
            SellerApplication::Individual(details) => details.validate()?,
            SellerApplication::Company(details) => details.validate()?,
        }
        Ok(())
    }
}

/// Result of a verification/role operation. `sign_out` is true exactly when
/// the operation changed `role`: the session collaborator must invalidate the
/// active token, because role gates which capabilities a token authorizes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerificationOutcome {
    pub user: user::Model,
    pub sign_out: bool,
}

/// Seller-application lifecycle and the customer↔seller role toggle.
///
/// Application states: none → pending → {approved | rejected}; a fresh
/// submission re-enters pending from rejected. A previously approved user
/// switching back to seller takes a fast path with no new review.
#[derive(Clone)]
pub struct VerificationService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl VerificationService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Customer requests the seller role.
    ///
    /// Lapsed sellers (`verification_status = approved`) flip back to seller
    /// immediately, keeping their original `verification_approved_at`. Anyone
    /// else must submit a valid application and wait for review; their role
    /// stays `customer` until an admin approves.
    #[instrument(skip(self, application), fields(user_id = %user_id))]
    pub async fn request_seller(
        &self,
        user_id: Uuid,
        application: Option<SellerApplication>,
    ) -> Result<VerificationOutcome, ServiceError> {
        let user = self.load_user(user_id).await?;
        let old_role = user.role;

        if user.verification_status == Some(VerificationStatus::Approved) {
            return self.fast_path_reapproval(user, application).await;
        }

        let application = application.ok_or_else(|| {
            ServiceError::invalid_field("seller_type", "application details are required")
        })?;
        application.validate_fields()?;

        if let SellerApplication::Company(ref details) = application {
            self.ensure_inn_unique(&details.inn, user_id).await?;
        }

        let now = Utc::now();
        let mut active: user::ActiveModel = user.into();
        active = apply_application_fields(active, &application);
        active.verification_status = Set(Some(VerificationStatus::Pending));
        active.verification_requested_at = Set(Some(now));
        // Explicitly held at customer until an admin acts.
        active.role = Set(Role::Customer);
        active.updated_at = Set(now);

        let updated = self.save_user(active).await?;
        let sign_out = updated.role != old_role;

        info!(user_id = %updated.id, "seller verification requested");
        self.event_sender
            .send(Event::VerificationRequested { user_id: updated.id })
            .await;
        if sign_out {
            self.event_sender
                .send(Event::RoleChanged {
                    user_id: updated.id,
                    new_role: updated.role,
                })
                .await;
        }

        Ok(VerificationOutcome {
            user: updated,
            sign_out,
        })
    }

    /// Seller voluntarily reverts to customer. Verification state and
    /// `is_verify` stay intact so a later re-request takes the fast path.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn revert_to_customer(
        &self,
        user_id: Uuid,
    ) -> Result<VerificationOutcome, ServiceError> {
        let user = self.load_user(user_id).await?;
        let old_role = user.role;

        let mut active: user::ActiveModel = user.into();
        active.role = Set(Role::Customer);
        active.updated_at = Set(Utc::now());
        let updated = self.save_user(active).await?;

        let sign_out = old_role != Role::Customer;
        if sign_out {
            info!(user_id = %updated.id, "seller reverted to customer");
            self.event_sender
                .send(Event::RoleChanged {
                    user_id: updated.id,
                    new_role: Role::Customer,
                })
                .await;
        }

        Ok(VerificationOutcome {
            user: updated,
            sign_out,
        })
    }

    /// Admin approves a pending application.
    #[instrument(skip(self), fields(user_id = %user_id, admin_id = %principal.user_id))]
    pub async fn approve(
        &self,
        principal: &Principal,
        user_id: Uuid,
    ) -> Result<VerificationOutcome, ServiceError> {
        if !permissions::can_review_verifications(principal) {
            return Err(ServiceError::Forbidden("admin access required".to_string()));
        }

        let user = self.load_user(user_id).await?;
        require_pending(&user, VerificationStatus::Approved)?;
        let old_role = user.role;

        let now = Utc::now();
        let mut active: user::ActiveModel = user.into();
        active.role = Set(Role::Seller);
        active.verification_status = Set(Some(VerificationStatus::Approved));
        active.verification_approved_at = Set(Some(now));
        active.is_verify = Set(true);
        active.updated_at = Set(now);

        let updated = self.save_user(active).await?;
        let sign_out = updated.role != old_role;

        info!(user_id = %updated.id, "seller verification approved");
        self.event_sender
            .send(Event::VerificationApproved { user_id: updated.id })
            .await;
        if sign_out {
            self.event_sender
                .send(Event::RoleChanged {
                    user_id: updated.id,
                    new_role: Role::Seller,
                })
                .await;
        }

        Ok(VerificationOutcome {
            user: updated,
            sign_out,
        })
    }

    /// Admin rejects a pending application. The reason is mandatory and the
    /// role stays untouched; the user may resubmit later.
    #[instrument(skip(self), fields(user_id = %user_id, admin_id = %principal.user_id))]
    pub async fn reject(
        &self,
        principal: &Principal,
        user_id: Uuid,
        reason: &str,
    ) -> Result<VerificationOutcome, ServiceError> {
        if !permissions::can_review_verifications(principal) {
            return Err(ServiceError::Forbidden("admin access required".to_string()));
        }

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::invalid_field(
                "rejection_reason",
                "rejection reason is required",
            ));
        }

        let user = self.load_user(user_id).await?;
        require_pending(&user, VerificationStatus::Rejected)?;

        let now = Utc::now();
        let mut active: user::ActiveModel = user.into();
        active.verification_status = Set(Some(VerificationStatus::Rejected));
        active.verification_rejected_at = Set(Some(now));
        active.verification_rejection_reason = Set(Some(reason.to_string()));
        active.updated_at = Set(now);

        let updated = self.save_user(active).await?;

        info!(user_id = %updated.id, %reason, "seller verification rejected");
        self.event_sender
            .send(Event::VerificationRejected {
                user_id: updated.id,
                reason: reason.to_string(),
            })
            .await;

        Ok(VerificationOutcome {
            user: updated,
            sign_out: false,
        })
    }

    /// Users awaiting review, oldest request first.
    #[instrument(skip(self))]
    pub async fn list_pending(
        &self,
        principal: &Principal,
    ) -> Result<Vec<user::Model>, ServiceError> {
        if !permissions::can_review_verifications(principal) {
            return Err(ServiceError::Forbidden("admin access required".to_string()));
        }

        let users = UserEntity::find()
            .filter(user::Column::VerificationStatus.eq(VerificationStatus::Pending))
            .order_by_asc(user::Column::VerificationRequestedAt)
            .all(&*self.db)
            .await?;

        Ok(users)
    }

    async fn fast_path_reapproval(
        &self,
        user: user::Model,
        application: Option<SellerApplication>,
    ) -> Result<VerificationOutcome, ServiceError> {
        let old_role = user.role;
        let user_id = user.id;

        let mut active: user::ActiveModel = user.into();
        if let Some(application) = application {
            application.validate_fields()?;
            if let SellerApplication::Company(ref details) = application {
                self.ensure_inn_unique(&details.inn, user_id).await?;
            }
            active = apply_application_fields(active, &application);
        }
        active.role = Set(Role::Seller);
        // verification_status stays approved, verification_approved_at keeps
        // its original value: no new review happens on the fast path.
        active.updated_at = Set(Utc::now());

        let updated = self.save_user(active).await?;
        let sign_out = updated.role != old_role;

        if sign_out {
            info!(user_id = %updated.id, "previously approved seller restored without review");
            self.event_sender
                .send(Event::RoleChanged {
                    user_id: updated.id,
                    new_role: Role::Seller,
                })
                .await;
        }

        Ok(VerificationOutcome {
            user: updated,
            sign_out,
        })
    }

    /// Read-then-write pre-check; the partial unique index on `users.inn` is
    /// the final authority for races that slip past it.
    async fn ensure_inn_unique(&self, inn: &str, user_id: Uuid) -> Result<(), ServiceError> {
        let taken = UserEntity::find()
            .filter(user::Column::Inn.eq(inn))
            .filter(user::Column::Id.ne(user_id))
            .one(&*self.db)
            .await?;

        if taken.is_some() {
            return Err(ServiceError::Conflict(
                "INN is already registered by another account".to_string(),
            ));
        }
        Ok(())
    }

    async fn load_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))
    }

    async fn save_user(&self, active: user::ActiveModel) -> Result<user::Model, ServiceError> {
        active.update(&*self.db).await.map_err(|e: DbErr| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                ServiceError::Conflict("INN is already registered by another account".to_string())
            } else {
                e.into()
            }
        })
    }
}

fn apply_application_fields(
    mut active: user::ActiveModel,
    application: &SellerApplication,
) -> user::ActiveModel {
    active.seller_type = Set(Some(application.seller_type()));
    match application {
        SellerApplication::Individual(details) => {
            active.passport_number = Set(Some(details.passport_number.clone()));
            active.passport_issued_by = Set(Some(details.passport_issued_by.clone()));
            active.passport_issue_date = Set(Some(details.passport_issue_date));
            active.phone = Set(Some(details.phone.clone()));
        }
        SellerApplication::Company(details) => {
            active.inn = Set(Some(details.inn.clone()));
            active.company_name = Set(Some(details.company_name.clone()));
            active.address = Set(Some(details.address.clone()));
            active.phone = Set(Some(details.phone.clone()));
        }
    }
    active
}

fn require_pending(user: &user::Model, target: VerificationStatus) -> Result<(), ServiceError> {
    if user.verification_status != Some(VerificationStatus::Pending) {
        let from = user
            .verification_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());
        return Err(ServiceError::InvalidTransition {
            from,
            to: target.to_string(),
        });
    }
    Ok(())
}
