use std::net::SocketAddr;

use axum::{routing, Router};
use doctors_portal::app::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "doctors_portal=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_state = AppState::new_from_env().await.unwrap();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", routing::get(|| async { "Doctors portal is running " }))
        .route(
            "/services",
            routing::get(doctors_portal::api::service::index),
        )
        .route(
            "/v2/services",
            routing::get(doctors_portal::api::service::index_aggregated),
        )
        .route(
            "/addPrice",
            routing::get(doctors_portal::api::service::reset_prices),
        )
        .route(
            "/appointmentSpecialty",
            routing::get(doctors_portal::api::service::specialties),
        )
        .route("/jwt", routing::get(doctors_portal::api::token::issue))
        .route("/users", routing::get(doctors_portal::api::user::index))
        .route("/users", routing::post(doctors_portal::api::user::create))
        .route(
            "/users/:id",
            routing::delete(doctors_portal::api::user::delete),
        )
        // GET reads the segment as an email, PUT as a user id
        .route(
            "/users/admin/:key",
            routing::get(doctors_portal::api::user::is_admin)
                .put(doctors_portal::api::user::make_admin),
        )
        .route(
            "/bookings",
            routing::get(doctors_portal::api::booking::index),
        )
        .route(
            "/bookings",
            routing::post(doctors_portal::api::booking::create),
        )
        .route("/doctors", routing::get(doctors_portal::api::doctor::index))
        .route(
            "/doctors",
            routing::post(doctors_portal::api::doctor::create),
        )
        .route(
            "/doctors/:id",
            routing::delete(doctors_portal::api::doctor::delete),
        )
        .with_state(app_state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(5000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::debug!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
