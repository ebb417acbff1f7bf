pub struct Config {
    // Wi-Fi SSID to connect to
    pub wifi_ssid: &'static str,

    // Wi-Fi pre-shared key (password)
    pub wifi_psk: &'static str,

    // Device ID (used as DHCP hostname)
    pub device_id: &'static str,

    // Reporting service hostname
    pub api_host: &'static str,

    // Reporting service port (plain HTTP, usually 80)
    pub api_port: u16,

    // Path of the update endpoint
    pub api_path: &'static str,

    // Write API key sent as the `api_key` query parameter
    pub api_key: &'static str,

    // Delay between two reporting cycles in milliseconds
    pub report_interval_ms: u64,
}

// config values are generated at compile time
include!(concat!(env!("OUT_DIR"), "/config.rs"));
