use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::plans::list_plans,
        crate::api::payments::create_order,
        crate::api::payments::verify_payment,
        crate::api::webhooks::razorpay_webhook
    ),
    components(
        schemas(
            crate::api::payments::CreateOrderRequest,
            crate::api::payments::CreateOrderResponse,
            crate::api::payments::VerifyPaymentRequest,
            crate::models::PaymentKind
        )
    ),
    tags(
        (name = "plans", description = "Pricing plan catalog"),
        (name = "payments", description = "Order creation and payment verification"),
        (name = "webhooks", description = "Callbacks from Razorpay")
    )
)]
pub struct ApiDoc;
