pub mod accounts;
pub mod defaults;
pub mod demo;
pub mod env;
pub mod http;

pub use demo::{apply_routes, run_cluster_demo};
pub use env::read_env_any;
pub use http::{cluster_app, serve_cluster};
