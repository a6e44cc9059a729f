// src/main.rs
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use podcast_billing::razorpay::RazorpayClient;
use podcast_billing::{api, docs, sweep, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let key_id = env::var("RAZORPAY_KEY_ID").expect("RAZORPAY_KEY_ID required");
    let key_secret = env::var("RAZORPAY_KEY_SECRET").expect("RAZORPAY_KEY_SECRET required");
    let webhook_secret =
        env::var("RAZORPAY_WEBHOOK_SECRET").expect("RAZORPAY_WEBHOOK_SECRET required");
    let refund_window_days = env::var("REFUND_WINDOW_DAYS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(7);

    let razorpay = RazorpayClient::new(key_id, key_secret, webhook_secret);

    sweep::spawn_renewal_sweep(pool.clone());

    let state = web::Data::new(AppState {
        pool,
        razorpay,
        refund_window_days,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Gateway callbacks are authenticated by their own signature
            .service(api::webhooks::razorpay_webhook)
            // Authenticated API
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::plans::list_plans)
                    .service(api::payments::create_order)
                    .service(api::payments::verify_payment)
                    .service(api::subscriptions::get_subscription)
                    .service(api::subscriptions::cancel_subscription)
                    .service(api::subscriptions::reactivate_subscription)
                    .service(api::subscriptions::change_plan)
                    .service(api::subscriptions::request_refund)
                    .service(api::subscriptions::list_payments)
                    .service(api::admin::list_subscriptions)
                    .service(api::admin::subscription_action)
                    .service(api::admin::list_refunds)
                    .service(api::admin::refund_action),
            )
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
