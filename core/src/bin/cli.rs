/// Threadline CLI: rule checks, task extraction and the demo session
fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }
    threadline_core::cli_app::run(std::env::args().collect())
}
