use crate::config::ObservabilityCfg;
use tracing_subscriber::EnvFilter;

pub fn init_tracing(cfg: &ObservabilityCfg) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,binance_futures_service=debug"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if cfg.log_json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install json subscriber: {e}"))?;
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?;
    }
    Ok(())
}
