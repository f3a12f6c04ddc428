//! ProjecxIQ API Server
//!
//! Project management backend: users, projects, tasks, time tracking, files,
//! comments, notifications and audit logs, with real-time updates over WebSockets.
//! Uses hexagonal (ports & adapters) architecture for clean separation of concerns.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    middleware,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Serialize;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adapters;
mod app;
mod auth;
mod config;
mod domain;
mod entity;
mod error;
mod handlers;
mod realtime;

#[cfg(test)]
mod test_utils;


use adapters::{
    run_migrations, LocalFileStorage, PostgresAuditLogRepository, PostgresCommentRepository,
    PostgresFileRepository, PostgresMilestoneRepository, PostgresNotificationPreferenceRepository,
    PostgresNotificationRepository, PostgresProjectRepository, PostgresTaskRepository,
    PostgresTimeEntryRepository, PostgresUserRepository,
};
use app::{
    AnalyticsService, AuditService, AuthService, CommentService, FileService, MilestoneService,
    NotificationPreferenceService, NotificationService, ProjectService, ReportService,
    TaskService, TimeEntryService, UserService,
};
use auth::{PasswordHasher, RevocationList, TokenService};
use config::{Config, LogFormat};
use domain::ports::{Notifier, RealtimePublisher};
use realtime::ConnectionManager;

/// Headroom for multipart framing on top of the file size limit
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService<PostgresUserRepository>>,
    pub user_service: Arc<UserService<PostgresUserRepository>>,
    pub project_service: Arc<ProjectService<PostgresProjectRepository, PostgresUserRepository>>,
    pub task_service: Arc<
        TaskService<PostgresTaskRepository, PostgresProjectRepository, PostgresUserRepository>,
    >,
    pub time_entry_service: Arc<
        TimeEntryService<
            PostgresTimeEntryRepository,
            PostgresTaskRepository,
            PostgresProjectRepository,
        >,
    >,
    pub file_service:
        Arc<FileService<PostgresFileRepository, LocalFileStorage, PostgresProjectRepository>>,
    pub comment_service: Arc<
        CommentService<
            PostgresCommentRepository,
            PostgresTaskRepository,
            PostgresProjectRepository,
            PostgresUserRepository,
        >,
    >,
    pub milestone_service:
        Arc<MilestoneService<PostgresMilestoneRepository, PostgresProjectRepository>>,
    pub notification_service: Arc<
        NotificationService<
            PostgresNotificationRepository,
            PostgresNotificationPreferenceRepository,
        >,
    >,
    pub notification_preference_service:
        Arc<NotificationPreferenceService<PostgresNotificationPreferenceRepository>>,
    pub audit_service: Arc<AuditService<PostgresAuditLogRepository>>,
    pub report_service: Arc<
        ReportService<
            PostgresTimeEntryRepository,
            PostgresTaskRepository,
            PostgresProjectRepository,
            PostgresUserRepository,
        >,
    >,
    pub analytics_service: Arc<
        AnalyticsService<
            PostgresProjectRepository,
            PostgresTaskRepository,
            PostgresTimeEntryRepository,
            PostgresUserRepository,
            PostgresNotificationRepository,
            PostgresMilestoneRepository,
        >,
    >,
    pub hub: Arc<ConnectionManager>,
    pub config: Config,
}

/// Wire adapters and services. Nothing here touches the database.
pub fn build_state(config: Config, db: DatabaseConnection) -> AppState {
    // Create adapters
    let user_repo = Arc::new(PostgresUserRepository::new(db.clone()));
    let project_repo = Arc::new(PostgresProjectRepository::new(db.clone()));
    let task_repo = Arc::new(PostgresTaskRepository::new(db.clone()));
    let time_entry_repo = Arc::new(PostgresTimeEntryRepository::new(db.clone()));
    let file_repo = Arc::new(PostgresFileRepository::new(db.clone()));
    let comment_repo = Arc::new(PostgresCommentRepository::new(db.clone()));
    let notification_repo = Arc::new(PostgresNotificationRepository::new(db.clone()));
    let preference_repo = Arc::new(PostgresNotificationPreferenceRepository::new(db.clone()));
    let milestone_repo = Arc::new(PostgresMilestoneRepository::new(db.clone()));
    let audit_repo = Arc::new(PostgresAuditLogRepository::new(db));
    let storage = Arc::new(LocalFileStorage::new(config.upload_dir.clone()));

    let hub = Arc::new(ConnectionManager::new());
    let publisher: Arc<dyn RealtimePublisher> = hub.clone();

    // Notifications honor user preferences, persist, then push to live sockets
    let notification_service = Arc::new(NotificationService::new(
        notification_repo.clone(),
        preference_repo.clone(),
        publisher.clone(),
    ));
    let notification_preference_service =
        Arc::new(NotificationPreferenceService::new(preference_repo));
    let notifier: Arc<dyn Notifier> = notification_service.clone();

    let tokens = TokenService::new(
        &config.secret_key,
        config.algorithm,
        config.access_token_expire_minutes,
        config.refresh_token_expire_days,
    );
    let auth_service = Arc::new(AuthService::new(
        user_repo.clone(),
        tokens,
        PasswordHasher::new(config.password_hash_iterations),
        Arc::new(RevocationList::new()),
        config.password_min_length,
    ));

    let user_service = Arc::new(UserService::new(user_repo.clone()));

    let project_service = Arc::new(ProjectService::new(
        project_repo.clone(),
        user_repo.clone(),
        publisher.clone(),
    ));

    let task_service = Arc::new(TaskService::new(
        task_repo.clone(),
        project_repo.clone(),
        user_repo.clone(),
        notifier.clone(),
        publisher.clone(),
    ));

    let milestone_service = Arc::new(MilestoneService::new(
        milestone_repo.clone(),
        project_repo.clone(),
        notifier.clone(),
        publisher,
    ));

    let time_entry_service = Arc::new(TimeEntryService::new(
        time_entry_repo.clone(),
        task_repo.clone(),
        project_repo.clone(),
        notifier.clone(),
    ));

    let file_service = Arc::new(FileService::new(
        file_repo,
        storage,
        project_repo.clone(),
        config.max_upload_size,
    ));

    let comment_service = Arc::new(CommentService::new(
        comment_repo,
        task_repo.clone(),
        project_repo.clone(),
        user_repo.clone(),
        notifier,
    ));

    let audit_service = Arc::new(AuditService::new(audit_repo));

    let report_service = Arc::new(ReportService::new(
        time_entry_repo.clone(),
        task_repo.clone(),
        project_repo.clone(),
        user_repo.clone(),
    ));

    let analytics_service = Arc::new(AnalyticsService::new(
        project_repo,
        task_repo,
        time_entry_repo,
        user_repo,
        notification_repo,
        milestone_repo,
    ));

    AppState {
        auth_service,
        user_service,
        project_service,
        task_service,
        time_entry_service,
        file_service,
        comment_service,
        milestone_service,
        notification_service,
        notification_preference_service,
        audit_service,
        report_service,
        analytics_service,
        hub,
        config,
    }
}

#[derive(Serialize)]
struct WelcomeResponse {
    message: String,
    version: String,
    docs: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
    app_name: String,
}

#[derive(Serialize)]
struct InfoResponse {
    app_name: String,
    version: String,
    debug: bool,
    database_url: &'static str,
}

async fn root(State(state): State<AppState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: format!("Welcome to {}", state.config.app_name),
        version: state.config.app_version.clone(),
        docs: "See /info for service details",
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: state.config.app_version.clone(),
        app_name: state.config.app_name.clone(),
    })
}

async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        app_name: state.config.app_name.clone(),
        version: state.config.app_version.clone(),
        debug: state.config.debug,
        database_url: "***",
    })
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            config
                .allowed_hosts
                .iter()
                .filter_map(|h| HeaderValue::from_str(h).ok()),
        )
    };
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the full router
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    // Rate limiting config: 2 req/sec sustained, burst of 5, keyed by peer IP
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(2)
            .burst_size(5)
            .finish()
            .context("Failed to build governor config")?,
    );

    // Credential endpoints (no auth, rate limited)
    let auth_routes = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Sockets authenticate through their query string
    let socket_routes = Router::new()
        .route("/ws/notifications", get(handlers::notifications_socket))
        .route("/ws/project/:project_id", get(handlers::project_socket))
        .route("/ws/chat/:project_id", get(handlers::chat_socket));

    let upload_limit = state.config.max_upload_size + MULTIPART_OVERHEAD;
    let file_routes = Router::new()
        .route("/files", get(handlers::list_files).post(handlers::upload_file))
        .route(
            "/files/:id",
            get(handlers::get_file)
                .put(handlers::update_file)
                .delete(handlers::delete_file),
        )
        .route("/files/:id/download", get(handlers::download_file))
        .route(
            "/files/:id/versions",
            get(handlers::list_versions).post(handlers::upload_version),
        )
        .route(
            "/files/:id/versions/:version_id/rollback",
            post(handlers::rollback_version),
        )
        .route(
            "/files/:id/permissions",
            get(handlers::list_permissions).post(handlers::grant_permission),
        )
        .route(
            "/files/:id/permissions/:user_id",
            delete(handlers::revoke_permission),
        )
        .layer(DefaultBodyLimit::max(upload_limit));

    let protected_routes = Router::new()
        // Session
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route("/auth/change-password", post(handlers::change_password))
        // Users
        .route("/users", get(handlers::list_users))
        .route("/users/me", get(handlers::get_me).put(handlers::update_me))
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/role", put(handlers::update_role))
        .route("/users/:id/activate", post(handlers::activate_user))
        .route("/users/:id/deactivate", post(handlers::deactivate_user))
        .route(
            "/users/:id/notification-preferences",
            get(handlers::list_preferences).post(handlers::create_preference),
        )
        .route(
            "/users/:id/notification-preferences/bulk-update",
            post(handlers::bulk_update_preferences),
        )
        .route(
            "/users/:id/notification-preferences/create-defaults",
            post(handlers::create_default_preferences),
        )
        .route(
            "/users/:id/notification-preferences/stats",
            get(handlers::preference_stats),
        )
        .route(
            "/users/:id/notification-preferences/:notification_type",
            put(handlers::update_preference).delete(handlers::delete_preference),
        )
        // Projects
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/projects/:id",
            get(handlers::get_project)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route(
            "/projects/:id/members",
            get(handlers::list_members).post(handlers::add_member),
        )
        .route(
            "/projects/:id/members/:user_id",
            delete(handlers::remove_member),
        )
        // Milestones
        .route(
            "/projects/:id/milestones",
            get(handlers::list_milestones).post(handlers::create_milestone),
        )
        .route("/projects/:id/milestones/stats", get(handlers::milestone_stats))
        .route(
            "/projects/:id/milestones/:milestone_id",
            get(handlers::get_milestone),
        )
        .route(
            "/projects/milestones/:milestone_id",
            put(handlers::update_milestone).delete(handlers::delete_milestone),
        )
        .route(
            "/projects/milestones/:milestone_id/dependencies",
            post(handlers::add_milestone_dependency),
        )
        .route(
            "/projects/milestones/:milestone_id/dependencies/:prerequisite_id",
            delete(handlers::remove_milestone_dependency),
        )
        // Tasks
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route("/tasks/statistics", get(handlers::task_statistics))
        .route(
            "/tasks/:id",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route("/tasks/:id/status", patch(handlers::update_task_status))
        .route("/tasks/:id/assign", patch(handlers::assign_task))
        .route(
            "/tasks/:id/dependencies",
            get(handlers::list_dependencies).post(handlers::add_dependency),
        )
        .route(
            "/tasks/:id/dependencies/:depends_on_id",
            delete(handlers::remove_dependency),
        )
        // Time entries
        .route(
            "/time-entries",
            get(handlers::list_entries).post(handlers::create_entry),
        )
        .route("/time-entries/pending", get(handlers::pending_entries))
        .route("/time-entries/statistics", get(handlers::entry_statistics))
        .route(
            "/time-entries/:id",
            get(handlers::get_entry)
                .put(handlers::update_entry)
                .delete(handlers::delete_entry),
        )
        .route("/time-entries/:id/approve", post(handlers::approve_entry))
        .route("/time-entries/:id/reject", post(handlers::reject_entry))
        // Comments
        .route(
            "/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route(
            "/comments/:id",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/stats", get(handlers::notification_stats))
        .route("/notifications/unread-count", get(handlers::unread_count))
        .route("/notifications/read-all", post(handlers::mark_all_read))
        .route("/notifications/:id/read", post(handlers::mark_read))
        .route(
            "/notifications/:id",
            delete(handlers::delete_notification),
        )
        // Reports and analytics
        .route("/reports/time", get(handlers::time_report))
        .route("/reports/projects/:id", get(handlers::project_report))
        .route("/reports/performance", get(handlers::user_performance))
        .route("/analytics/dashboard", get(handlers::dashboard))
        .route("/analytics/projects/:id", get(handlers::project_analytics))
        // Audit
        .route("/audit", get(handlers::list_audit_logs))
        .route("/audit/stats", get(handlers::audit_stats))
        .route("/audit/:id", get(handlers::get_audit_log))
        // Hub inspection and pushes
        .route("/ws/status", get(handlers::socket_status))
        .route("/ws/connections", get(handlers::list_connections))
        .route("/ws/channels", get(handlers::list_channels))
        .route("/ws/broadcast", post(handlers::broadcast_all))
        .route(
            "/ws/broadcast/channel/:channel",
            post(handlers::broadcast_channel),
        )
        .route("/ws/notify/:user_id", post(handlers::notify_user))
        .merge(file_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let cors = cors_layer(&state.config);

    Ok(Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/info", get(info))
        .merge(auth_routes)
        .merge(socket_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn init_tracing(config: &Config) {
    let default_filter = if config.debug {
        "debug"
    } else {
        "info,projecxiq_api=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;

    init_tracing(&config);
    tracing::info!(version = %config.app_version, "Starting {}...", config.app_name);

    // Connect to PostgreSQL
    tracing::info!("Connecting to database...");
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.database_max_connections)
        .sqlx_logging(config.database_echo);
    let db = Database::connect(options)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    if config.run_migrations {
        let applied = run_migrations(&db)
            .await
            .context("Failed to apply migrations")?;
        tracing::info!(applied, "Migrations up to date");
    }

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;

    let state = build_state(config, db);
    let app = build_router(state)?;

    // Start server
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}
