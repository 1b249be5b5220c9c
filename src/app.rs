use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, HttpMakeClassifier, TraceLayer},
};
use tracing::Level;

use crate::access::{
    AccessStore, Action, AuthRequirement, AuthorizationStage, CaseAccessGate, OperationRegistry, OperationSpec,
    PolicyRegistry, PrincipalResolver, RequirementLookup, ScopedTable, Section,
};
use crate::auth::{SessionService, TokenError, TokenService, TokenSettings};
use crate::config::{AppConfig, SecurityConfig};
use crate::database::RecordStore;
use crate::handlers::{protected, public};
use crate::middleware::{authorize_operation, resolve_principal, Guard};

/// Everything a request needs, shared across the router.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub sessions: SessionService,
    pub resolver: PrincipalResolver,
    pub stage: AuthorizationStage,
    pub gate: CaseAccessGate,
    pub access: Arc<dyn AccessStore>,
    pub records: Arc<dyn RecordStore>,
    pub operations: Arc<OperationRegistry>,
    pub region_header: String,
    pub tenant_domain: Option<String>,
    pub security: SecurityConfig,
    pub request_logging: bool,
}

impl AppState {
    pub fn new<R>(config: &AppConfig, access: Arc<dyn AccessStore>, records: Arc<R>) -> Result<Self, TokenError>
    where
        R: RecordStore + 'static,
    {
        let tokens = Arc::new(TokenService::new(TokenSettings::from_config(&config.security), access.clone())?);
        let stage = AuthorizationStage::new(access.clone(), Arc::new(PolicyRegistry::standard()), config.access.region_policy)
            .with_audit_logging(config.security.enable_audit_logging);

        Ok(Self {
            sessions: SessionService::new(tokens.clone(), access.clone()),
            resolver: PrincipalResolver::new(tokens.clone(), access.clone()),
            gate: CaseAccessGate::new(records.clone()),
            tokens,
            stage,
            access,
            records,
            operations: Arc::new(operations()),
            region_header: config.api.region_header.to_ascii_lowercase(),
            tenant_domain: config.api.tenant_domain.clone(),
            security: config.security.clone(),
            request_logging: config.api.enable_request_logging,
        })
    }
}

fn policy(section: Section, action: Action) -> AuthRequirement {
    AuthRequirement::authenticated().with_policy(PolicyRegistry::name_for(section, action))
}

/// Declared authorization requirements of every protected operation.
pub fn operations() -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    registry
        .register(OperationSpec::new("session.select_region", AuthRequirement::authenticated()))
        .register(OperationSpec::new("session.logout", AuthRequirement::authenticated()))
        .register(OperationSpec::new("session.whoami", AuthRequirement::authenticated()))
        .register(OperationSpec::new("cases.list", policy(Section::CaseManagement, Action::View)))
        .register(OperationSpec::new("cases.create", policy(Section::CaseManagement, Action::Create)))
        .register(
            OperationSpec::new("cases.get", policy(Section::CaseManagement, Action::View))
                .addressing(ScopedTable::Cases, "id"),
        )
        .register(
            OperationSpec::new("cases.update", policy(Section::CaseManagement, Action::Edit))
                .addressing(ScopedTable::Cases, "id"),
        )
        .register(
            OperationSpec::new("cases.delete", policy(Section::CaseManagement, Action::Delete))
                .addressing(ScopedTable::Cases, "id"),
        )
        .register(
            OperationSpec::new("chat.access", policy(Section::Chat, Action::View)).addressing(ScopedTable::Cases, "id"),
        )
        .register(OperationSpec::new("judges.list", policy(Section::Judges, Action::View)))
        .register(
            OperationSpec::new("judges.get", policy(Section::Judges, Action::View)).addressing(ScopedTable::Judges, "id"),
        )
        .register(OperationSpec::new("case_types.list", policy(Section::CaseTypes, Action::View)))
        .register(
            OperationSpec::new("case_types.get", policy(Section::CaseTypes, Action::View))
                .addressing(ScopedTable::CaseTypes, "id"),
        )
        .register(OperationSpec::new("regions.list", AuthRequirement::authenticated()))
        .register(OperationSpec::new(
            "permissions.list",
            policy(Section::RolePermissions, Action::View).with_roles("Admin"),
        ))
        .register(OperationSpec::new(
            "permissions.upsert",
            policy(Section::RolePermissions, Action::Edit).with_roles("Admin"),
        ));
    registry
}

pub fn router(state: AppState) -> Router {
    let guarded = |operation: &'static str, route: MethodRouter<AppState>| {
        if state.operations.lookup(operation).is_none() {
            tracing::error!("Route registered for undeclared operation '{}'; it will reject every request", operation);
        }
        route.route_layer(middleware::from_fn_with_state(Guard::new(state.clone(), operation), authorize_operation))
    };

    let router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/auth/login", post(public::login))
        .route("/auth/refresh", post(public::refresh))
        // Session
        .route("/api/auth/region", guarded("session.select_region", post(protected::session::select_region)))
        .route("/api/auth/session", guarded("session.logout", delete(protected::session::logout)))
        .route("/api/auth/whoami", guarded("session.whoami", get(protected::session::whoami)))
        // Cases
        .route(
            "/api/cases",
            guarded("cases.list", get(protected::cases::list))
                .merge(guarded("cases.create", post(protected::cases::create))),
        )
        .route(
            "/api/cases/:id",
            guarded("cases.get", get(protected::cases::get))
                .merge(guarded("cases.update", put(protected::cases::update)))
                .merge(guarded("cases.delete", delete(protected::cases::delete))),
        )
        .route("/api/cases/:id/chat", guarded("chat.access", get(protected::chat::access)))
        // Reference data
        .route("/api/judges", guarded("judges.list", get(protected::lookups::judges_list)))
        .route("/api/judges/:id", guarded("judges.get", get(protected::lookups::judges_get)))
        .route("/api/case-types", guarded("case_types.list", get(protected::lookups::case_types_list)))
        .route("/api/case-types/:id", guarded("case_types.get", get(protected::lookups::case_types_get)))
        // Regions and permission matrix
        .route("/api/regions", guarded("regions.list", get(protected::regions::list)))
        .route(
            "/api/regions/:region_id/permissions",
            guarded("permissions.list", get(protected::permissions::list))
                .merge(guarded("permissions.upsert", put(protected::permissions::upsert))),
        )
        // Global middleware
        .layer(middleware::from_fn_with_state(state.clone(), resolve_principal))
        .layer(cors_layer(&state.security, &state.region_header))
        .layer(trace_layer(state.request_logging));

    router.with_state(state)
}

/// Request spans at `info` when request logging is on, `debug` otherwise.
fn trace_layer(request_logging: bool) -> TraceLayer<HttpMakeClassifier> {
    let level = if request_logging { Level::INFO } else { Level::DEBUG };
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(level))
        .on_response(DefaultOnResponse::new().level(level))
}

fn cors_layer(security: &SecurityConfig, region_header: &str) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins = security.cors_origins.iter().filter_map(|origin| origin.parse::<HeaderValue>().ok()).collect::<Vec<_>>();
    let mut headers = vec![header::AUTHORIZATION, header::CONTENT_TYPE];
    if let Ok(name) = HeaderName::from_bytes(region_header.as_bytes()) {
        headers.push(name);
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(AllowHeaders::list(headers))
}
