use actix_web::middleware::DefaultHeaders;
use actix_web::web::ServiceConfig;

mod checks;
mod health;

/// Headers the browser dashboard needs to call the trigger cross-origin
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Headers", "authorization, x-client-info, apikey, content-type"))
}

pub fn routes(cfg: &mut ServiceConfig) {
    health::routes(cfg);
    checks::routes(cfg);
}
