use actix_web::{HttpResponse, Responder, get};

macros_utils::routes! {
    route liveness,
}

/// Liveness probe for the process itself; says nothing about monitors.
#[get("/")]
pub async fn liveness() -> impl Responder {
    HttpResponse::Ok()
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};

    use super::routes;

    #[actix_web::test]
    async fn test_liveness_is_ok() {
        let app = test::init_service(App::new().configure(routes)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
