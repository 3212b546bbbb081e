use tracing::Level;

/// Install the stderr subscriber; logs read `LEVEL message`.
pub fn init(level: Level) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init()
        .map_err(anyhow::Error::msg)
}
