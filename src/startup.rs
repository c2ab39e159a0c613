use tracing_subscriber::EnvFilter;

/// Initialize tracing on stderr, keeping stdout for command output.
///
/// `RUST_LOG` wins over `log_level` when set.
pub fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("oss_meter_client={0},oss_provision={0}", log_level).into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
