use log::debug;

use crate::calibration::{AdcUnit, Attenuation, BitWidth, CalibrationTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogError {
    /// Sampling was requested with a count of zero
    NoSamples,
    /// A raw conversion failed
    Read,
    /// The channel is configured differently from the calibration table
    ConfigMismatch,
    /// The divider voltage is zero, the sensor ratio is undefined
    ZeroVoltage,
    /// The divider voltage is at or above supply
    Saturated,
}

/// Static configuration of one analog input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub channel: u8,
    pub attenuation: Attenuation,
    pub width: BitWidth,
    pub unit: AdcUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogReading {
    pub channel: u8,
    /// Mean raw code over the sampled conversions
    pub raw: u16,
    pub millivolts: u32,
    width: BitWidth,
}

impl AnalogReading {
    pub fn is_saturated(&self) -> bool {
        self.raw >= self.width.max_code()
    }
}

/// One-shot raw conversions on an ADC unit
pub trait RawAdc {
    fn read_raw(&mut self, channel: u8) -> Result<u16, AnalogError>;
}

pub struct AnalogSampler<A> {
    adc: A,
    table: CalibrationTable,
}

impl<A: RawAdc> AnalogSampler<A> {
    pub fn new(adc: A, table: CalibrationTable) -> Self {
        Self { adc, table }
    }

    /// Average `sample_count` raw reads and convert the mean to millivolts
    pub fn sample(
        &mut self,
        channel: &ChannelConfig,
        sample_count: u32,
    ) -> Result<AnalogReading, AnalogError> {
        if sample_count == 0 {
            return Err(AnalogError::NoSamples);
        }
        if channel.unit != self.table.unit()
            || channel.attenuation != self.table.attenuation()
            || channel.width != self.table.width()
        {
            return Err(AnalogError::ConfigMismatch);
        }

        let mut sum: u64 = 0;
        for _ in 0..sample_count {
            sum += u64::from(self.adc.read_raw(channel.channel)?);
        }
        let raw = (sum / u64::from(sample_count)) as u16;
        let millivolts = self.table.raw_to_millivolts(raw);

        debug!(
            "ADC channel {}: raw={} voltage={}mV",
            channel.channel, raw, millivolts
        );

        Ok(AnalogReading {
            channel: channel.channel,
            raw,
            millivolts,
            width: channel.width,
        })
    }
}

/// MQ-series gas sensor read through a load resistor divider
#[derive(Debug, Clone, Copy)]
pub struct GasSensor {
    pub supply_mv: u32,
}

impl GasSensor {
    pub const fn new(supply_mv: u32) -> Self {
        Self { supply_mv }
    }

    /// Sensor resistance over load resistance, `(supply - v) / v`
    pub fn resistance_ratio(&self, reading: &AnalogReading) -> Result<f32, AnalogError> {
        if reading.is_saturated() || reading.millivolts >= self.supply_mv {
            return Err(AnalogError::Saturated);
        }
        if reading.millivolts == 0 {
            return Err(AnalogError::ZeroVoltage);
        }
        Ok((self.supply_mv - reading.millivolts) as f32 / reading.millivolts as f32)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::calibration::{characterize, tests::FakeEfuse};

    /// Replays a fixed sequence of raw codes, cycling when exhausted
    pub(crate) struct ScriptedAdc {
        pub codes: Vec<u16>,
        pub reads: usize,
        pub fail: bool,
    }

    impl ScriptedAdc {
        pub fn new(codes: &[u16]) -> Self {
            Self {
                codes: codes.to_vec(),
                reads: 0,
                fail: false,
            }
        }
    }

    impl RawAdc for ScriptedAdc {
        fn read_raw(&mut self, _channel: u8) -> Result<u16, AnalogError> {
            if self.fail {
                return Err(AnalogError::Read);
            }
            let code = self.codes[self.reads % self.codes.len()];
            self.reads += 1;
            Ok(code)
        }
    }

    pub(crate) fn channel(id: u8) -> ChannelConfig {
        ChannelConfig {
            channel: id,
            attenuation: Attenuation::Db11,
            width: BitWidth::Bits12,
            unit: AdcUnit::Unit1,
        }
    }

    pub(crate) fn default_table() -> CalibrationTable {
        characterize(
            &FakeEfuse::blank(),
            AdcUnit::Unit1,
            Attenuation::Db11,
            BitWidth::Bits12,
            1100,
        )
    }

    #[test]
    fn test_sample_is_integer_mean_through_table() {
        let sequences: [&[u16]; 4] = [&[1000], &[1, 2], &[4095, 0, 7], &[10, 11, 12, 13, 14, 15, 16]];
        for codes in sequences {
            let table = default_table();
            let mut sampler = AnalogSampler::new(ScriptedAdc::new(codes), table);
            let n = codes.len() as u32;
            let reading = sampler.sample(&channel(6), n).unwrap();

            let mean = (codes.iter().map(|&c| c as u32).sum::<u32>() / n) as u16;
            assert_eq!(reading.raw, mean);
            assert_eq!(reading.millivolts, table.raw_to_millivolts(mean));
        }
    }

    #[test]
    fn test_sample_reads_exactly_count_times() {
        let mut sampler = AnalogSampler::new(ScriptedAdc::new(&[2000]), default_table());
        sampler.sample(&channel(6), 64).unwrap();
        assert_eq!(sampler.adc.reads, 64);
    }

    #[test]
    fn test_large_sample_count_does_not_overflow() {
        let mut sampler = AnalogSampler::new(ScriptedAdc::new(&[4095]), default_table());
        let reading = sampler.sample(&channel(6), 1_100_000).unwrap();
        assert_eq!(reading.raw, 4095);
        assert_eq!(sampler.adc.reads, 1_100_000);
    }

    #[test]
    fn test_zero_samples_is_rejected() {
        let mut sampler = AnalogSampler::new(ScriptedAdc::new(&[2000]), default_table());
        assert_eq!(sampler.sample(&channel(6), 0), Err(AnalogError::NoSamples));
    }

    #[test]
    fn test_read_failure_propagates() {
        let mut adc = ScriptedAdc::new(&[2000]);
        adc.fail = true;
        let mut sampler = AnalogSampler::new(adc, default_table());
        assert_eq!(sampler.sample(&channel(6), 4), Err(AnalogError::Read));
    }

    #[test]
    fn test_mismatched_channel_config() {
        let mut sampler = AnalogSampler::new(ScriptedAdc::new(&[2000]), default_table());
        let mut config = channel(6);
        config.attenuation = Attenuation::Db6;
        assert_eq!(sampler.sample(&config, 4), Err(AnalogError::ConfigMismatch));
    }

    #[test]
    fn test_gas_ratio_guards() {
        let gas = GasSensor::new(2450);
        let reading = |raw, millivolts| AnalogReading {
            channel: 6,
            raw,
            millivolts,
            width: BitWidth::Bits12,
        };

        assert_eq!(gas.resistance_ratio(&reading(0, 0)), Err(AnalogError::ZeroVoltage));
        assert_eq!(gas.resistance_ratio(&reading(4095, 1000)), Err(AnalogError::Saturated));
        assert_eq!(gas.resistance_ratio(&reading(3000, 2450)), Err(AnalogError::Saturated));
        assert_eq!(gas.resistance_ratio(&reading(3000, 2600)), Err(AnalogError::Saturated));

        let ratio = gas.resistance_ratio(&reading(1000, 1225)).unwrap();
        assert!((ratio - 1.0).abs() < f32::EPSILON);
    }
}
