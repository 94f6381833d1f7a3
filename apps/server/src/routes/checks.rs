use actix_web::{HttpResponse, route, web};
use healthbeat_service::orchestrator::{CheckOrchestrator, RunSummary};
use serde::Serialize;
use tracing::error;

macros_utils::routes! {
    route run_checks,
    route preflight,
}

#[derive(Serialize)]
struct CycleResponse<'a> {
    success: bool,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Run one check cycle over every registered monitor.
///
/// Only a failed roster fetch turns into a 500; per-monitor failures are
/// reported through `failed_to_update_count`.
#[route("/health-check", method = "GET", method = "POST")]
pub async fn run_checks(orchestrator: web::Data<CheckOrchestrator>) -> HttpResponse {
    match orchestrator.run_cycle().await {
        Ok(summary) => HttpResponse::Ok().json(CycleResponse { success: true, summary: &summary }),
        Err(cycle_error) => {
            error!(error = %cycle_error, "Health check cycle failed");
            HttpResponse::InternalServerError().json(ErrorResponse { error: cycle_error.to_string() })
        }
    }
}

#[route("/health-check", method = "OPTIONS")]
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test, web};
    use async_trait::async_trait;
    use healthbeat_service::config::DatabaseConfig;
    use healthbeat_service::database::models::NewMonitor;
    use healthbeat_service::database::{Database, DatabaseImpl, open_database};
    use healthbeat_service::monitoring::{ProbeResult, Prober};
    use healthbeat_service::orchestrator::CheckOrchestrator;
    use healthbeat_service::pool::open_pool;
    use serde_json::Value;

    use crate::routes::{cors_headers, routes};

    struct AlwaysUnavailable;

    #[async_trait]
    impl Prober for AlwaysUnavailable {
        async fn probe(&self, _url: &str) -> ProbeResult {
            ProbeResult::response(503, 25)
        }
    }

    async fn migrated(dir: &tempfile::TempDir) -> Arc<DatabaseImpl> {
        let config = DatabaseConfig { path: dir.path().join("trigger.db"), pool_size: 4 };
        open_database(&config).await.unwrap()
    }

    fn orchestrator(database: Arc<dyn Database>) -> web::Data<CheckOrchestrator> {
        web::Data::new(CheckOrchestrator::new(database, Arc::new(AlwaysUnavailable), 4))
    }

    #[actix_web::test]
    async fn test_trigger_returns_flattened_summary() {
        let dir = tempfile::tempdir().unwrap();
        let database = migrated(&dir).await;
        database
            .register_monitor(&NewMonitor {
                name: "shop".into(),
                url: "https://shop.example".into(),
                check_interval: 5,
            })
            .await
            .unwrap();

        let app = test::init_service(
            App::new().app_data(orchestrator(database)).wrap(cors_headers()).configure(routes),
        )
        .await;

        let resp =
            test::call_service(&app, test::TestRequest::post().uri("/health-check").to_request())
                .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["checked"], 1);
        assert_eq!(body["down_count"], 1);
        assert_eq!(body["alerts_created"], 1);
        assert!(body["run_id"].is_string());
    }

    #[actix_web::test]
    async fn test_get_runs_a_cycle_too() {
        let dir = tempfile::tempdir().unwrap();
        let database = migrated(&dir).await;

        let app = test::init_service(App::new().app_data(orchestrator(database)).configure(routes))
            .await;

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/health-check").to_request())
                .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["checked"], 0);
    }

    #[actix_web::test]
    async fn test_preflight_carries_cors_headers() {
        let app = test::init_service(App::new().wrap(cors_headers()).configure(routes)).await;

        let req = test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/health-check")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
        assert_eq!(
            headers.get("access-control-allow-headers").unwrap(),
            "authorization, x-client-info, apikey, content-type"
        );
    }

    #[actix_web::test]
    async fn test_roster_failure_is_a_server_error() {
        let dir = tempfile::tempdir().unwrap();
        // No migrations, so the monitors table does not exist
        let pool = open_pool(dir.path().join("empty.db"), 2).await.unwrap();
        let database = Arc::new(DatabaseImpl::new_from_pool(pool));

        let app = test::init_service(App::new().app_data(orchestrator(database)).configure(routes))
            .await;

        let resp =
            test::call_service(&app, test::TestRequest::post().uri("/health-check").to_request())
                .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Failed to load monitors"));
    }
}
