use crate::{
    api::{leave_balance, leave_request, leave_type, report},
    auth::middleware::auth_middleware,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter state, built once and shared by every worker.
#[derive(Clone)]
pub struct RateLimits {
    protected: LimiterConfig,
    write: LimiterConfig,
}

impl RateLimits {
    pub fn new(protected_per_min: u32, write_per_min: u32) -> Result<Self> {
        Ok(Self {
            protected: build_limiter(protected_per_min).context("RATE_PROTECTED_PER_MIN")?,
            write: build_limiter(write_per_min).context("RATE_WRITE_PER_MIN")?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Result<LimiterConfig> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("rate limit must be positive")
}

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str, limits: &RateLimits) {
    let write = &limits.write;

    cfg.service(
        web::scope(api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(Governor::new(&limits.protected)) // rate limiting
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // /leave/check-balance
                    .service(
                        web::resource("/check-balance")
                            .route(web::post().to(leave_request::check_balance)),
                    )
                    // /leave/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_request::get_leave))
                            .route(web::put().to(leave_request::update_leave)),
                    )
                    // /leave/{id}/cancel
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(leave_request::cancel_leave)),
                    )
                    // /leave/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .wrap(Governor::new(write))
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    // /leave/{id}/reject
                    .service(
                        web::resource("/{id}/reject")
                            .wrap(Governor::new(write))
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    // /leave/{id}/comments
                    .service(
                        web::resource("/{id}/comments")
                            .route(web::post().to(leave_request::add_comment)),
                    ),
            )
            .service(
                web::scope("/leave-types")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_type::list_leave_types))
                            .route(web::post().to(leave_type::create_leave_type)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(leave_type::update_leave_type))
                            .route(web::delete().to(leave_type::delete_leave_type)),
                    ),
            )
            .service(
                web::scope("/balances")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_balance::list_balances))
                            .route(web::post().to(leave_balance::assign_balance)),
                    )
                    .service(
                        web::resource("/bulk")
                            .wrap(Governor::new(write))
                            .route(web::post().to(leave_balance::bulk_assign_balance)),
                    )
                    .service(
                        web::resource("/{employee_id}/{leave_type_id}/{year}")
                            .route(web::get().to(leave_balance::get_balance)),
                    ),
            )
            .service(web::resource("/reports").route(web::get().to(report::leave_report))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_access_token};
    use crate::config::Config;
    use crate::model::role::Role;
    use crate::service::LeaveServices;
    use crate::service::policy::LeavePolicy;
    use crate::service::testing::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, test, web::Data};
    use serde_json::{Value, json};

    const SECRET: &str = "test-secret";

    fn config() -> Config {
        Config {
            database_url: "mysql://unused".into(),
            jwt_secret: SECRET.into(),
            server_addr: "127.0.0.1:0".into(),
            db_max_connections: 1,
            rate_protected_per_min: 1000,
            rate_write_per_min: 1000,
            api_prefix: "/api".into(),
            leave_policy: LeavePolicy::default(),
            log_level: "debug".into(),
            log_dir: "logs".into(),
        }
    }

    fn bearer(employee_id: u64, role: Role) -> (&'static str, String) {
        let token = generate_access_token(
            TokenSubject {
                user_id: employee_id,
                username: format!("user{employee_id}"),
                role: role.id(),
                organization_id: ORG,
                employee_id: Some(employee_id),
            },
            SECRET,
            300,
        )
        .unwrap();
        ("Authorization", format!("Bearer {token}"))
    }

    macro_rules! app {
        ($services:expr) => {{
            let limits = RateLimits::new(1000, 1000).unwrap();
            test::init_service(
                App::new()
                    .app_data(Data::new(config()))
                    .app_data(Data::new($services))
                    .configure(move |cfg| configure(cfg, "/api", &limits)),
            )
            .await
        }};
    }

    fn peer() -> std::net::SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let fx = fixture().await;
        let app = app!(fx.services.clone());

        let req = test::TestRequest::get()
            .uri("/api/leave")
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn submit_approve_and_report_over_http() {
        let fx = fixture().await;
        fx.with_balance(ALICE, fx.annual, 2025, 10, 0, 0).await;
        let services: LeaveServices = fx.services.clone();
        let app = app!(services);

        let req = test::TestRequest::post()
            .uri("/api/leave")
            .peer_addr(peer())
            .insert_header(bearer(ALICE, Role::Employee))
            .set_json(json!({
                "leave_type_id": fx.annual,
                "start_date": "2025-06-01",
                "end_date": "2025-06-05",
                "reason": "Family trip"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["status"], "PENDING");
        assert_eq!(created["total_days"], 5);
        let id = created["id"].as_u64().unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/api/leave/{id}/approve"))
            .peer_addr(peer())
            .insert_header(bearer(ALICE, Role::Employee))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::put()
            .uri(&format!("/api/leave/{id}/approve"))
            .peer_addr(peer())
            .insert_header(bearer(MARY, Role::Manager))
            .set_json(json!({ "comment": "Enjoy" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri(&format!("/api/balances/{ALICE}/{}/2025", fx.annual))
            .peer_addr(peer())
            .insert_header(bearer(ALICE, Role::Employee))
            .to_request();
        let balance: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance["used_days"], 5);
        assert_eq!(balance["available_days"], 5);

        let req = test::TestRequest::get()
            .uri("/api/reports?year=2025")
            .peer_addr(peer())
            .insert_header(bearer(HANNA, Role::HrAdmin))
            .to_request();
        let report: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(report["summary"]["approved"], 1);
        assert_eq!(report["top_employees"][0]["employee_id"], ALICE);
    }

    #[actix_web::test]
    async fn service_errors_map_to_status_codes() {
        let fx = fixture().await;
        let app = app!(fx.services.clone());

        let req = test::TestRequest::get()
            .uri("/api/leave/424242")
            .peer_addr(peer())
            .insert_header(bearer(ALICE, Role::Employee))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Leave request not found");

        let req = test::TestRequest::get()
            .uri("/api/leave?limit=500")
            .peer_addr(peer())
            .insert_header(bearer(ALICE, Role::Employee))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let req = test::TestRequest::post()
            .uri("/api/balances/bulk")
            .peer_addr(peer())
            .insert_header(bearer(ALICE, Role::Employee))
            .set_json(json!({
                "employee_ids": [ALICE],
                "leave_type_id": fx.annual,
                "year": 2025,
                "total_days": 20
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
