pub mod api;
pub mod config;
pub mod convert;
pub mod error;
pub mod llm;
pub mod major;
pub mod models;
pub mod prompt;
pub mod rag;
pub mod store;

#[doc(hidden)]
pub mod testing;

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise info for this crate and the HTTP trace layer.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
