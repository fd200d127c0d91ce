use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Marketplace API",
        description = "Order lifecycle, fulfillment and seller verification engine"
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::confirm_receipt,
        crate::handlers::orders::admin_update_order,
        crate::handlers::carts::view_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::checkout,
        crate::handlers::fulfillment::seller_orders,
        crate::handlers::fulfillment::mark_item_sent,
        crate::handlers::fulfillment::mark_order_items_sent,
        crate::handlers::verification::apply,
        crate::handlers::verification::revert,
        crate::handlers::verification::list_pending,
        crate::handlers::verification::review,
        crate::handlers::settings::get_commission,
        crate::handlers::settings::set_commission,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::errors::FieldViolation,
        crate::entities::order::OrderStatus,
        crate::entities::user::Role,
        crate::entities::user::VerificationStatus,
        crate::entities::user::SellerType,
        crate::services::orders::CreateOrderInput,
        crate::services::orders::OrderLine,
        crate::services::orders::ShippingDetails,
        crate::services::orders::OrderItemView,
        crate::services::verification::SellerApplication,
        crate::services::verification::IndividualApplication,
        crate::services::verification::CompanyApplication,
        crate::services::verification::VerificationOutcome,
        crate::services::carts::CartView,
        crate::services::carts::CartItemView,
        crate::services::pricing::Totals,
    )),
    tags(
        (name = "orders", description = "Order creation and lifecycle"),
        (name = "cart", description = "Shopping cart and checkout"),
        (name = "seller", description = "Seller fulfillment"),
        (name = "verification", description = "Seller verification workflow"),
        (name = "admin", description = "Administrative operations"),
    )
)]
pub struct ApiDoc;
