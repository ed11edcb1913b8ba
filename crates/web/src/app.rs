use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::features::{admin, event_teams, payments, registration, teams};
use crate::middleware::rate_limit::rate_limit;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/api/teams", teams::routes::routes(&state))
        .nest("/api/events/:event_id", event_teams::routes::routes(&state))
        .nest("/api/payments", payments::routes::routes(&state))
        .nest("/api/admin", admin::routes::routes(state.api_keys.clone()))
        .merge(registration::routes::routes())
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(api)
        .merge(payments::routes::webhook_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
