use std::{env, error::Error, fs, path::Path};

use serde::Deserialize;

#[derive(Deserialize)]
struct RawConfig {
    wifi_ssid: String,
    wifi_psk: String,
    device_id: String,
    api_host: String,
    api_port: u16,
    api_path: String,
    api_key: String,
    report_interval_ms: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Tell Cargo to rerun if toml changes
    println!("cargo:rerun-if-changed=cfg.toml");
    println!("cargo:rerun-if-changed=cfg.toml.example");

    // Host builds (tests) run without a device config
    let source = if Path::new("cfg.toml").exists() {
        "cfg.toml"
    } else {
        println!("cargo:warning=cfg.toml not found, using cfg.toml.example");
        "cfg.toml.example"
    };

    // Read and parse
    let toml_str = fs::read_to_string(source)?;
    let raw: RawConfig = toml::from_str(&toml_str)?;

    if raw.report_interval_ms < 15_000 {
        println!(
            "cargo:warning=report_interval_ms={} is below the 15s service rate limit",
            raw.report_interval_ms
        );
    }

    // Generate Rust code
    let code = format!(
        r#"
        pub const CONFIG: Config = Config {{
            wifi_ssid: {ssid:?},
            wifi_psk: {psk:?},
            device_id: {dev:?},
            api_host: {host:?},
            api_port: {port},
            api_path: {path:?},
            api_key: {key:?},
            report_interval_ms: {intv},
        }};
    "#,
        ssid = raw.wifi_ssid,
        psk = raw.wifi_psk,
        dev = raw.device_id,
        host = raw.api_host,
        port = raw.api_port,
        path = raw.api_path,
        key = raw.api_key,
        intv = raw.report_interval_ms
    );

    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("config.rs");
    fs::write(dest_path, code)?;
    Ok(())
}
