use tb_app::cli;
use tb_app::config_loader;
use tb_app::driver;
use tb_ratelimit::RateLimiter;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "config/throttle.toml";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let _guard = tb_app::tracing_setup::init("tb_throttle", "./logs", tracing::Level::INFO, true);

    // An explicitly named config must load, the default one may be absent
    let config = match cli::config_path_arg() {
        Some(path) => {
            let config = config_loader::load_throttle_config(&path)?;
            info!("Loaded throttle config from {path}");
            config
        }
        None => config_loader::load_throttle_config_or_default(DEFAULT_CONFIG_PATH),
    };

    let bucket = config.bucket.build()?;
    info!("Bucket: {bucket:?}");
    info!(
        "Workload: workers={}, requests_per_worker={}, tokens_per_request={}, max_wait={:?}",
        config.workload.workers,
        config.workload.requests_per_worker,
        config.workload.tokens_per_request,
        config.workload.max_wait()
    );

    let report = driver::run(&bucket, &config.workload)?;

    info!("Configured rate: {:.3} tokens/s, achieved: {:.3} tokens/s", bucket.rate(), report.achieved_rate());
    if report.refused > 0 {
        info!("{} of {} requests refused by deadline", report.refused, report.granted + report.refused);
    }

    Ok(())
}
