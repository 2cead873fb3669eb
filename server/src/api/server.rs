//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use super::middleware;
use super::routes::{health, search, segments};
use crate::core::CoreApp;
use crate::core::constants::MAX_REQUEST_BODY_BYTES;
use crate::domain::{
    CalloutTransformer, ContactTransformer, PaymentTransformer, ResponseTransformer,
    SegmentService,
};

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Build the full router over the app's database
    pub fn router(app: &CoreApp) -> Router<()> {
        let pool = app.database.pool().clone();
        let search_config = app.config.search.clone();

        let contacts = Arc::new(ContactTransformer::new(pool.clone()));
        let segment_service = Arc::new(SegmentService::new(pool.clone(), contacts.clone()));

        let contacts_routes = search::routes(contacts, pool.clone(), search_config.clone());
        let callouts_routes = search::routes(
            Arc::new(CalloutTransformer::new()),
            pool.clone(),
            search_config.clone(),
        );
        let responses_routes = search::routes(
            Arc::new(ResponseTransformer::new()),
            pool.clone(),
            search_config.clone(),
        );
        let payments_routes = search::routes(
            Arc::new(PaymentTransformer::new()),
            pool.clone(),
            search_config.clone(),
        );
        let segments_routes = segments::routes(segment_service, search_config);

        Router::new()
            .route("/api/v1/health", get(health::health).with_state(pool))
            .nest("/api/v1/contacts", contacts_routes)
            .nest("/api/v1/callouts", callouts_routes)
            .nest("/api/v1/callout-responses", responses_routes)
            .nest("/api/v1/payments", payments_routes)
            .nest("/api/v1/segments", segments_routes)
            .fallback(middleware::handle_404)
            .layer(CompressionLayer::new())
            .layer(middleware::trace())
            .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self { app } = self;

        let shutdown = app.shutdown.clone();
        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);
        let router = Self::router(&app);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "API server listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::debug!("API server stopped");
        Ok(app)
    }
}
