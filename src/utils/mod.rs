// src/utils/mod.rs
use log::info;

pub fn setup_logging() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .level_for("tungstenite", log::LevelFilter::Warn)
        .level_for("tokio_tungstenite", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("hyper", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized.");
    Ok(())
}

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Rounds a value to the given number of significant digits. Used to bucket
/// prices so that re-detections of the same opportunity coalesce under one id.
pub fn round_sig(value: f64, digits: u32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return 0.0;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(digits as i32 - 1 - magnitude);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_round_sig() {
        assert_approx_eq!(round_sig(0.0038123, 4), 0.003812, 1e-12);
        assert_approx_eq!(round_sig(152.4567, 4), 152.5, 1e-9);
        assert_approx_eq!(round_sig(0.0044, 4), 0.0044, 1e-12);
        assert_eq!(round_sig(0.0, 4), 0.0);
        assert_eq!(round_sig(f64::NAN, 4), 0.0);
    }

    #[test]
    fn test_round_sig_buckets_nearby_prices_together() {
        // Quotes that wiggle below the bucket resolution share a bucket.
        assert_eq!(round_sig(0.0038001, 4), round_sig(0.0038004, 4));
        // Quotes further apart do not.
        assert_ne!(round_sig(0.0038, 4), round_sig(0.0044, 4));
    }
}
