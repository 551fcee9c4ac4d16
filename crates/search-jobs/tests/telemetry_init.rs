//! Installing the global subscriber, in a test binary of its own.

use search_jobs::{init_tracing, init_tracing_from_env, LogFormat};
use tracing::Level;

#[test]
fn repeated_init_is_harmless() {
    assert!(init_tracing_from_env(Level::INFO));
    assert!(!init_tracing(LogFormat::Json, Level::DEBUG));
    assert!(!init_tracing(LogFormat::Text, Level::WARN));
    tracing::info!("still logging after a second init");
}
