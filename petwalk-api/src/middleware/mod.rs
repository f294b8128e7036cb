pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, Actor, Claims};
pub use rate_limit::{metrics_middleware, rate_limit_middleware};
