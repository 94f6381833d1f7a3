//! Small declarative helpers shared by the HTTP apps.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web as __actix_web;

/// Generate a `routes` function registering actix services.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     route run_checks,
/// }
/// ```
///
/// expands to `pub fn routes(cfg: &mut ServiceConfig)` calling
/// `cfg.service(..)` for every listed handler, in order.
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($(route $handler:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::__actix_web::web::ServiceConfig) {
            $( cfg.service($handler); )*
        }
    };
}
