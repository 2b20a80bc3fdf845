#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = toml::from_str::<ecd_config::Config>(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // Anything that validates must map and calibrate cleanly.
    let engine_cfg = ecd_core::EcdConfig::from(&cfg);
    let t = ecd_core::Thresholds::calibrate(&engine_cfg, cfg.supply.voltage_v);
    let _ = t.bleach_half_threshold();
    let _ = engine_cfg.supports_supply(cfg.supply.voltage_v);
});
