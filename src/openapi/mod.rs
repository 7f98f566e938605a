use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{LoginRequest, RegisterRequest, TokenResponse},
    dto::{NewAddress, NewBill, NewCategory, NewOrderDetail, NewProduct, NewReview},
    entities::{
        address, bill, category, order, order_detail, product, review, DeliveryMethod,
        OrderStatus, PaymentType, UserRole,
    },
    errors::ErrorResponse,
    services::{
        clients::ClientView,
        orders::{DeliveryMethodInput, OrderItemInput, OrderLineView, OrderView, PlaceOrderRequest},
    },
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "E-commerce API",
        version = "1.0.0",
        description = r#"
Clients, catalog and orders for a small shop.

Placing an order resolves (or creates) the client and the bill, then writes the order
and its lines in one transaction. A confirmation email is sent after commit.

Writes to products and categories need a bearer token for an ADMIN client:

```
Authorization: Bearer <jwt>
```

List endpoints take `skip` and `limit` query parameters.
        "#,
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    modifiers(&BearerAuth),
    tags(
        (name = "orders", description = "Order placement and lookup"),
        (name = "products", description = "Product catalog"),
        (name = "categories", description = "Product categories"),
        (name = "clients", description = "Client accounts"),
        (name = "auth", description = "Registration and tokens"),
        (name = "health", description = "Liveness and readiness")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::list_products_by_category,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::clients::list_clients,
        crate::handlers::clients::get_client,
        crate::handlers::clients::create_client,
        crate::handlers::clients::update_client,
        crate::auth::register_handler,
        crate::auth::login_handler,
        crate::auth::me_handler,
        crate::health::health_check,
        crate::health::readiness_check,
    ),
    components(
        schemas(
            PlaceOrderRequest,
            OrderItemInput,
            DeliveryMethodInput,
            OrderView,
            OrderLineView,
            ClientView,
            RegisterRequest,
            LoginRequest,
            TokenResponse,
            NewProduct,
            NewCategory,
            NewBill,
            NewAddress,
            NewReview,
            NewOrderDetail,
            address::Model,
            bill::Model,
            category::Model,
            order::Model,
            order_detail::Model,
            product::Model,
            review::Model,
            DeliveryMethod,
            OrderStatus,
            PaymentType,
            UserRole,
            ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
