//! Application startup and lifecycle management.

use crate::config::SettlementConfig;
use crate::handlers;
use crate::services::{
    init_metrics, AuditTrail, Authorizer, GatewayRouter, LocalStorage, MalwareScanner,
    ProofUploadPipeline, QuarantineService, RecurringPaymentScheduler, SecureProofAccessGateway,
    SignatureScanner, Storage, TransactionLedger, WalletLedger,
};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, security_headers_middleware};
use service_core::retry::RetryConfig;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::services::repository::{
    InMemoryAuditStore, InMemoryProofStore, InMemoryQuarantineStore, InMemoryRecurringStore,
    InMemoryTransactionStore, InMemoryVendorStore,
};

/// Body cap for the upload route: the 5 MB file limit plus headroom for
/// multipart framing and the text fields. Axum's 2 MB default would cut
/// off valid proofs before the pipeline ever saw them.
const UPLOAD_BODY_LIMIT: usize = crate::services::proofs::MAX_FILE_BYTES + 64 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: SettlementConfig,
    pub ledger: Arc<TransactionLedger>,
    pub wallet: Arc<WalletLedger>,
    pub proofs: Arc<ProofUploadPipeline>,
    pub access: Arc<SecureProofAccessGateway>,
    pub quarantine: Arc<QuarantineService>,
    pub audit: Arc<AuditTrail>,
    pub scheduler: Arc<RecurringPaymentScheduler>,
    pub authorizer: Authorizer,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
    shutdown: CancellationToken,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: SettlementConfig) -> Result<Self, AppError> {
        init_metrics();

        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(&config.storage.local_path)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        config.storage.local_path,
                        e
                    );
                    e
                })?,
        );

        let audit = Arc::new(AuditTrail::new(Arc::new(InMemoryAuditStore::new())));
        let scanner: Arc<dyn MalwareScanner> = Arc::new(SignatureScanner);
        let proof_store = Arc::new(InMemoryProofStore::new());

        let quarantine = Arc::new(QuarantineService::new(
            Arc::new(InMemoryQuarantineStore::new()),
            storage.clone(),
            audit.clone(),
        ));
        let proofs = Arc::new(ProofUploadPipeline::new(
            proof_store.clone(),
            storage.clone(),
            scanner.clone(),
            quarantine.clone(),
            audit.clone(),
            config.proofs.ttl_days,
        ));
        let access = Arc::new(SecureProofAccessGateway::new(
            proof_store,
            quarantine.clone(),
            storage,
            scanner,
            audit.clone(),
            config.signing.secret.clone(),
            Duration::from_secs(config.signing.url_ttl_seconds),
        ));

        let router = Arc::new(GatewayRouter::simulated(
            Duration::from_millis(config.gateway.latency_ms),
            Duration::from_millis(config.gateway.attempt_timeout_ms),
            config.gateway.simulate_failures,
        ));
        let retry_policy = RetryConfig {
            max_retries: config.gateway.max_retries,
            initial_backoff: Duration::from_millis(config.gateway.retry_backoff_ms),
            ..RetryConfig::default()
        };
        let ledger = Arc::new(TransactionLedger::new(
            Arc::new(InMemoryTransactionStore::new()),
            router,
            retry_policy,
            config.gateway.card_decline_rate,
        ));

        let wallet = Arc::new(WalletLedger::new());
        let scheduler = Arc::new(RecurringPaymentScheduler::new(
            Arc::new(InMemoryRecurringStore::new()),
            Arc::new(InMemoryVendorStore::new()),
            wallet.clone(),
        ));

        let shutdown = CancellationToken::new();
        if config.scheduler.enabled {
            scheduler.spawn_processor(
                Duration::from_secs(config.scheduler.interval_seconds),
                shutdown.clone(),
            );
            tracing::info!(
                interval_seconds = config.scheduler.interval_seconds,
                "Recurring payment processor started"
            );
        }

        let state = AppState {
            config: config.clone(),
            ledger,
            wallet,
            proofs,
            access,
            quarantine,
            audit,
            scheduler,
            authorizer: Authorizer,
        };

        let app = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_endpoint))
            .route("/phone/validate", get(handlers::payments::validate_phone))
            .route("/payments/card", post(handlers::payments::charge_card))
            .route("/payments/wallet", post(handlers::payments::charge_wallet))
            .route("/payments", get(handlers::payments::list_payments))
            .route(
                "/payments/:transaction_id",
                get(handlers::payments::get_payment),
            )
            .route(
                "/payments/:transaction_id/verify",
                post(handlers::payments::verify_payment),
            )
            .route(
                "/orders/:order_id/payments",
                get(handlers::payments::payments_for_order),
            )
            .route("/wallet", get(handlers::wallet::balance))
            .route("/wallet/deposit", post(handlers::wallet::deposit))
            .route("/wallet/withdraw", post(handlers::wallet::withdraw))
            .route("/wallet/transfer", post(handlers::wallet::transfer))
            .route("/wallet/pay", post(handlers::wallet::pay))
            .route("/wallet/history", get(handlers::wallet::history))
            .route(
                "/proofs",
                post(handlers::proofs::upload_proof)
                    .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
            )
            .route(
                "/proofs/file/:file_name",
                get(handlers::proofs::serve_proof_file),
            )
            .route("/admin/proofs/:file_name", get(handlers::admin::fetch_proof))
            .route(
                "/admin/proofs/:file_name/review",
                post(handlers::admin::review_proof),
            )
            .route("/admin/quarantine", get(handlers::admin::list_quarantine))
            .route(
                "/admin/quarantine/bulk-review",
                post(handlers::admin::bulk_review_quarantine),
            )
            .route(
                "/admin/quarantine/:id/review",
                post(handlers::admin::review_quarantine),
            )
            .route("/admin/audit", get(handlers::admin::query_audit))
            .route("/admin/audit/export", get(handlers::admin::export_audit))
            .route("/admin/cleanup", post(handlers::admin::cleanup))
            .route(
                "/vendors",
                post(handlers::recurring::create_vendor).get(handlers::recurring::list_vendors),
            )
            .route(
                "/recurring",
                post(handlers::recurring::create_plan).get(handlers::recurring::list_plans),
            )
            .route("/recurring/analytics", get(handlers::recurring::analytics))
            .route(
                "/recurring/process-due",
                post(handlers::recurring::process_due),
            )
            .route("/recurring/:id", get(handlers::recurring::get_plan))
            .route("/recurring/:id/pause", post(handlers::recurring::pause_plan))
            .route(
                "/recurring/:id/resume",
                post(handlers::recurring::resume_plan),
            )
            .route(
                "/recurring/:id/cancel",
                post(handlers::recurring::cancel_plan),
            )
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(cors_layer(&config.cors.allowed_origins))
            .with_state(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
            shutdown,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run until the server exits, then stop the background processor.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let result = self.server.await;
        self.shutdown.cancel();
        result
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Invalid CORS origin '{}': {}", o, e))
                .ok()
        }))
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-admin-role"),
            HeaderName::from_static("x-session-token"),
        ])
}
