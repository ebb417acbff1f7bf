pub mod adc;
pub mod dht_pin;
pub mod efuse;

pub use adc::GasAdc;
pub use dht_pin::OpenDrainPin;
pub use efuse::FusedCalibration;
