//! HTTP surface: the throttle middleware and the server that mounts it.

mod handlers;
mod middleware;
mod server;

pub use handlers::{health_handler, not_found_handler, stats_handler, ThrottleStats};
pub use middleware::{
    apply_headers, client_key, rejection_response, throttle_middleware, RejectionBody,
    ThrottleState, REJECTION_MESSAGE,
};
pub use server::HttpServer;
