pub mod auth_guard;
pub mod route_policy;
