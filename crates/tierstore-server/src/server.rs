use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use tierstore_cache::{LocalCache, MultiLevelCache};
use tierstore_storage::{DynRepository, Product, Record, User};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    CacheStack,
    config::{AppConfig, CacheConfig},
    create_cache, handlers, open_repositories,
    service::{CachePolicy, RecordService},
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub products: RecordService<Product>,
    pub users: RecordService<User>,
    pub cache: MultiLevelCache,
    /// The in-process tier, kept for health reporting.
    pub local: Arc<LocalCache>,
    pub cache_deadline: Duration,
}

/// Resolves the record service for one record type.
pub trait ServiceFor<R: Record> {
    fn service(&self) -> &RecordService<R>;
}

impl ServiceFor<Product> for AppState {
    fn service(&self) -> &RecordService<Product> {
        &self.products
    }
}

impl ServiceFor<User> for AppState {
    fn service(&self) -> &RecordService<User> {
        &self.users
    }
}

impl AppState {
    pub fn new(
        cfg: &CacheConfig,
        stack: CacheStack,
        products: DynRepository<Product>,
        users: DynRepository<User>,
    ) -> Self {
        let collection_ttl = Duration::from_secs(cfg.collection_ttl_secs);
        let products = RecordService::new(
            products,
            stack.cache.clone(),
            CachePolicy::new(Duration::from_secs(cfg.product_ttl_secs), collection_ttl),
        );
        let users = RecordService::new(
            users,
            stack.cache.clone(),
            CachePolicy::new(Duration::from_secs(cfg.user_ttl_secs), collection_ttl),
        );
        Self {
            products,
            users,
            cache: stack.cache,
            local: stack.local,
            cache_deadline: cfg.request_deadline(),
        }
    }

    pub fn records<R: Record>(&self) -> &RecordService<R>
    where
        Self: ServiceFor<R>,
    {
        <Self as ServiceFor<R>>::service(self)
    }
}

pub struct TierstoreServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/api/v1/products",
            get(handlers::list_records::<Product>).post(handlers::create_record::<Product>),
        )
        .route(
            "/api/v1/products/{id}",
            get(handlers::read_record::<Product>)
                .put(handlers::update_record::<Product>)
                .delete(handlers::delete_record::<Product>),
        )
        .route(
            "/api/v1/users",
            get(handlers::list_records::<User>).post(handlers::create_record::<User>),
        )
        .route(
            "/api/v1/users/{id}",
            get(handlers::read_record::<User>)
                .put(handlers::update_record::<User>)
                .delete(handlers::delete_record::<User>),
        )
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Opens the record store and the cache tiers, then assembles the router.
    pub async fn build(self) -> anyhow::Result<TierstoreServer> {
        let (products, users) = open_repositories(&self.config.storage).await?;
        let stack = create_cache(&self.config.redis, &self.config.cache).await?;
        tracing::info!(tiers = ?stack.cache.tier_names(), "Cache ready");

        let state = AppState::new(&self.config.cache, stack, products, users);
        let app = build_app(&self.config, state);

        Ok(TierstoreServer {
            addr: self.addr,
            app,
        })
    }
}

impl TierstoreServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
