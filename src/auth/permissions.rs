//! Capability predicates.
//!
//! All authorization decisions are concentrated here as a small closed set of
//! predicates evaluated once per request, so the order and verification state
//! machines stay free of role checks and remain independently testable.

use uuid::Uuid;

use crate::auth::Principal;
use crate::entities::order;
use crate::entities::user::Role;

/// Admin free-form status override, including tracking number and notes.
pub fn can_override_order(principal: &Principal) -> bool {
    principal.is_admin
}

/// The owning customer confirming receipt of a shipped order.
pub fn can_confirm_receipt(principal: &Principal, order: &order::Model) -> bool {
    principal.user_id == order.user_id
}

/// Viewing a single order: the owner or an admin.
pub fn can_view_order(principal: &Principal, order: &order::Model) -> bool {
    principal.is_admin || principal.user_id == order.user_id
}

/// Flipping an item's fulfillment flag: the seller owning the referenced
/// product, or an admin.
pub fn can_mark_item_sent(principal: &Principal, product_seller_id: Uuid) -> bool {
    principal.is_admin
        || (principal.role == Role::Seller && principal.user_id == product_seller_id)
}

/// Reviewing (approving/rejecting) seller applications.
pub fn can_review_verifications(principal: &Principal) -> bool {
    principal.is_admin
}

/// Editing marketplace settings such as the commission percentage.
pub fn can_edit_settings(principal: &Principal) -> bool {
    principal.is_admin
}
