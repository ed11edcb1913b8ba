use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

use crate::features::{admin, event_teams, payments, registration, teams};

#[derive(OpenApi)]
#[openapi(
    paths(
        teams::handlers::create_team,
        teams::handlers::my_team,
        teams::handlers::get_team,
        teams::handlers::join_team,
        teams::handlers::leave_team,
        teams::handlers::kick_member,
        teams::handlers::confirm_team,
        teams::handlers::delete_team,
        event_teams::handlers::register,
        event_teams::handlers::create_team,
        event_teams::handlers::my_team,
        event_teams::handlers::join_team,
        event_teams::handlers::leave_team,
        event_teams::handlers::kick_member,
        event_teams::handlers::confirm_team,
        event_teams::handlers::delete_team,
        payments::handlers::create_order,
        payments::handlers::save_payment,
        payments::handlers::webhook,
        admin::handlers::set_registration_window,
        admin::handlers::set_leader,
        admin::handlers::mark_attendance,
        registration::handlers::get_registration_window,
    ),
    components(
        schemas(
            storage::dto::common::ErrorResponse,
            storage::dto::team::CreateTeamRequest,
            storage::dto::team::JoinTeamRequest,
            storage::dto::team::KickMemberRequest,
            storage::dto::team::TeamSummary,
            storage::dto::team::MemberResponse,
            storage::dto::team::TeamResponse,
            storage::dto::team::LeaveTeamResponse,
            storage::dto::team::DeleteTeamResponse,
            storage::dto::payment::CreateOrderRequest,
            storage::dto::payment::CreateOrderResponse,
            storage::dto::payment::SavePaymentRequest,
            storage::dto::payment::SavePaymentResponse,
            storage::dto::payment::WebhookAck,
            storage::dto::admin::SetLeaderRequest,
            storage::dto::admin::AttendanceRequest,
            storage::dto::admin::RegistrationWindowRequest,
            storage::dto::admin::RegistrationWindowResponse,
            storage::models::PaymentStatus,
        )
    ),
    tags(
        (name = "teams", description = "Hackathon-wide team formation"),
        (name = "events", description = "Event-scoped teams and Solo registration"),
        (name = "payments", description = "Team fee orders and settlement"),
        (name = "registration", description = "Public registration status"),
        (name = "admin", description = "Administrative endpoints, API key required"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("Session token")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("API Key")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn documented_statuses(doc: &Value, path: &str, method: &str) -> Vec<String> {
        doc["paths"][path][method]["responses"]
            .as_object()
            .unwrap_or_else(|| panic!("{method} {path} is not documented"))
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn test_domain_rejections_are_documented_as_bad_requests() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();

        for (path, method) in [
            ("/api/events/{event_id}/teams", "post"),
            ("/api/teams/{team_id}/confirm", "post"),
            ("/api/events/{event_id}/teams/{team_id}/confirm", "post"),
            ("/api/teams/{team_id}", "delete"),
            ("/api/events/{event_id}/teams/{team_id}", "delete"),
        ] {
            let statuses = documented_statuses(&doc, path, method);
            assert!(!statuses.contains(&"409".to_string()), "{method} {path}: {statuses:?}");
        }

        let statuses = documented_statuses(&doc, "/api/events/{event_id}/teams", "post");
        assert!(statuses.contains(&"400".to_string()));

        let statuses = documented_statuses(&doc, "/api/payments/create-order", "post");
        assert!(statuses.contains(&"404".to_string()));
        assert!(!statuses.contains(&"403".to_string()));
    }
}
