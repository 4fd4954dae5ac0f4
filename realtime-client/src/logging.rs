use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tungstenite=warn,tokio_tungstenite=warn"));

    fmt().with_env_filter(env_filter).with_target(false).init();
}

/// Like [`init_tracing`] but tolerates an already-installed subscriber,
/// so every test can call it without coordinating.
pub fn try_init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tungstenite=warn,tokio_tungstenite=warn"));

    let _ = fmt().with_env_filter(env_filter).with_target(false).try_init();
}
