use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation as HalAttenuation};
use esp_hal::peripherals::{ADC1, GPIO34, GPIO35};
use esp_hal::Blocking;

use crate::analog::{AnalogError, RawAdc};
use crate::calibration::Attenuation;

type Mq2Pin = AdcPin<GPIO34<'static>, ADC1<'static>>;
type Mq3Pin = AdcPin<GPIO35<'static>, ADC1<'static>>;

/// ADC1 with the MQ-2 (GPIO34, channel 6) and MQ-3 (GPIO35, channel 7) inputs
pub struct GasAdc {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    mq2: Mq2Pin,
    mq3: Mq3Pin,
}

impl GasAdc {
    pub fn new(
        adc1: ADC1<'static>,
        mq2: GPIO34<'static>,
        mq3: GPIO35<'static>,
        attenuation: Attenuation,
    ) -> Self {
        let attenuation = match attenuation {
            Attenuation::Db0 => HalAttenuation::_0dB,
            Attenuation::Db2_5 => HalAttenuation::_2p5dB,
            Attenuation::Db6 => HalAttenuation::_6dB,
            Attenuation::Db11 => HalAttenuation::_11dB,
        };

        let mut config = AdcConfig::new();
        let mq2 = config.enable_pin(mq2, attenuation);
        let mq3 = config.enable_pin(mq3, attenuation);
        let adc = Adc::new(adc1, config);

        Self { adc, mq2, mq3 }
    }
}

impl RawAdc for GasAdc {
    fn read_raw(&mut self, channel: u8) -> Result<u16, AnalogError> {
        match channel {
            6 => nb::block!(self.adc.read_oneshot(&mut self.mq2)).map_err(|_| AnalogError::Read),
            7 => nb::block!(self.adc.read_oneshot(&mut self.mq3)).map_err(|_| AnalogError::Read),
            _ => Err(AnalogError::ConfigMismatch),
        }
    }
}
