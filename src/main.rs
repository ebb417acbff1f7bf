#![no_std]
#![no_main]

use static_cell::StaticCell;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{self as hal};
use esp_println::logger::init_logger;

use hal::{delay::Delay, gpio::Flex, rng::Rng, timer::timg::TimerGroup};

use esp32_telemetry_node::analog::AnalogSampler;
use esp32_telemetry_node::board::{FusedCalibration, GasAdc, OpenDrainPin};
use esp32_telemetry_node::calibration::{characterize, log_efuse_support, AdcUnit, Attenuation, BitWidth};
use esp32_telemetry_node::config::CONFIG;
use esp32_telemetry_node::constants::*;
use esp32_telemetry_node::dht::{Dht11, Dht11Pin};
use esp32_telemetry_node::measurement::Measurement;
use esp32_telemetry_node::net::TcpConnector;
use esp32_telemetry_node::reporter::HttpReporter;
use esp32_telemetry_node::wifi::Wifi;

esp_bootloader_esp_idf::esp_app_desc!();

type Node = Measurement<
    Dht11Pin<OpenDrainPin<'static>, Delay>,
    GasAdc,
    TcpConnector<'static>,
>;

static RX_BUF: StaticCell<[u8; RX_BUFFER_SIZE]> = StaticCell::new();
static TX_BUF: StaticCell<[u8; TX_BUFFER_SIZE]> = StaticCell::new();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    init_logger(log::LevelFilter::Info);
    log::info!("Telemetry node v{}", VERSION);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let rng = Rng::new(peripherals.RNG);

    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timg1 = TimerGroup::new(peripherals.TIMG1);

    esp_hal_embassy::init(timg0.timer0);

    // possibly high transient required at init
    // https://github.com/esp-rs/esp-hal/issues/1626
    Timer::after(Duration::from_millis(1000)).await;

    let wifi = Wifi::new(
        peripherals.WIFI,
        timg1.timer0,
        peripherals.RADIO_CLK,
        rng,
        spawner,
    )
    .await
    .unwrap();

    wifi.connect().await.unwrap();

    log_efuse_support(&FusedCalibration, AdcUnit::Unit1);
    let table = characterize(
        &FusedCalibration,
        AdcUnit::Unit1,
        Attenuation::Db11,
        BitWidth::Bits12,
        DEFAULT_VREF_MV,
    );
    let adc = GasAdc::new(
        peripherals.ADC1,
        peripherals.GPIO34,
        peripherals.GPIO35,
        Attenuation::Db11,
    );

    let dht_pin = OpenDrainPin::new(Flex::new(peripherals.GPIO4));
    let dht = Dht11::new(
        Dht11Pin::new(dht_pin, Delay::new()),
        Duration::from_millis(DHT_MIN_INTERVAL_MS),
    );

    let rx_buf = RX_BUF.init([0; RX_BUFFER_SIZE]);
    let tx_buf = TX_BUF.init([0; TX_BUFFER_SIZE]);
    let reporter = HttpReporter::new(
        TcpConnector::new(wifi.stack, rx_buf, tx_buf),
        CONFIG.api_host,
        CONFIG.api_port,
        CONFIG.api_path,
        Duration::from_millis(MIN_REPORT_SPACING_MS),
    );

    let measurement = Measurement::new(
        dht,
        AnalogSampler::new(adc, table),
        reporter,
        CONFIG.api_key,
        Duration::from_millis(CONFIG.report_interval_ms),
    );

    spawner.spawn(main_task(measurement)).ok();
}

#[embassy_executor::task]
async fn main_task(mut measurement: Node) {
    measurement.run().await
}
