use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "eSIM Store API",
        description = r#"
Backend for the eSIM storefront: checkout creation against Stripe,
Coinbase Commerce and Lemon Squeezy, signed webhook ingestion into the
order projection, the admin order listing, and the reseller balance
passthrough.

Webhook endpoints authenticate with provider signatures over the raw
request body; the balance endpoint requires a bearer identity token.
"#
    ),
    tags(
        (name = "Checkout", description = "Checkout and charge creation"),
        (name = "Webhooks", description = "Payment provider webhook receivers"),
        (name = "Orders", description = "Admin order listing and updates"),
        (name = "Balance", description = "Reseller account balance")
    ),
    paths(
        crate::handlers::checkout::create_checkout_session,
        crate::handlers::checkout::create_coinbase_charge,
        crate::handlers::checkout::create_lemonsqueezy_checkout,
        crate::handlers::webhooks::stripe_webhook,
        crate::handlers::webhooks::coinbase_webhook,
        crate::handlers::webhooks::lemonsqueezy_webhook,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::update_order,
        crate::handlers::balance::get_balance,
    ),
    components(
        schemas(
            crate::handlers::checkout::CheckoutSessionResponse,
            crate::handlers::checkout::ProviderCheckoutRequest,
            crate::handlers::checkout::ChargeResponse,
            crate::handlers::checkout::LemonSqueezyCheckoutResponse,
            crate::handlers::orders::OrderListResponse,
            crate::handlers::orders::Pagination,
            crate::handlers::orders::OrderUpdateResponse,
            crate::handlers::balance::BalanceResponse,
            crate::services::checkout::CheckoutOrder,
            crate::services::checkout::stripe::SessionRequest,
            crate::services::orders::AdminOrderUpdate,
            crate::webhooks::WebhookResponse,
            crate::webhooks::HandlerResult,
            crate::entities::order::Model,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
