/// Current firmware version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of the heap in DRAM (internal memory)
pub const HEAP_SIZE: usize = 72 * 1024;

/// Size of the TCP socket receive buffer
pub const RX_BUFFER_SIZE: usize = 4096;
/// Size of the TCP socket transmit buffer
pub const TX_BUFFER_SIZE: usize = 1024;
/// TCP socket inactivity timeout in seconds
pub const SOCKET_TIMEOUT_SECS: u64 = 30;

/// Timeout for the Wi-Fi link and DHCP lease at startup
pub const WIFI_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Delay before retrying a dropped Wi-Fi association
pub const WIFI_RECONNECT_DELAY_MS: u64 = 5000;

/// Number of raw ADC reads averaged into one value
pub const ADC_SAMPLE_COUNT: u32 = 64;
/// Reference voltage used when no eFuse calibration is burned
pub const DEFAULT_VREF_MV: u16 = 1100;
/// Supply voltage seen by the MQ gas sensor voltage divider
pub const GAS_SENSOR_SUPPLY_MV: u32 = 2450;

/// Minimum interval between two DHT11 bus transactions
pub const DHT_MIN_INTERVAL_MS: u64 = 2000;

/// Capacity of the encoded query string
pub const QUERY_BUFFER_SIZE: usize = 128;
/// Capacity of the buffer holding the HTTP response head
pub const HTTP_HEAD_BUFFER_SIZE: usize = 1024;
/// Size of one body read delivered as a data event
pub const HTTP_RECV_BUFFER_SIZE: usize = 512;

/// Minimum spacing between two requests enforced by the reporting service
pub const MIN_REPORT_SPACING_MS: u64 = 15_000;
