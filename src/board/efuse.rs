use esp_hal::efuse::{
    Efuse, ADC1_TP_HIGH, ADC1_TP_LOW, ADC2_TP_HIGH, ADC2_TP_LOW, ADC_VREF, BLK3_PART_RESERVE,
};

use crate::calibration::{decode_two_point, decode_vref, AdcUnit, EfuseError, EfuseSource, TwoPoint};

/// Factory ADC calibration burned into the ESP32 eFuse blocks
pub struct FusedCalibration;

impl EfuseSource for FusedCalibration {
    fn two_point(&self, unit: AdcUnit) -> Result<TwoPoint, EfuseError> {
        // BLK3 only carries two point values when flagged as partially reserved
        if !Efuse::read_bit(BLK3_PART_RESERVE) {
            return Err(EfuseError::NotBurned);
        }

        let (low, high) = match unit {
            AdcUnit::Unit1 => (
                Efuse::read_field_le::<u8>(ADC1_TP_LOW),
                Efuse::read_field_le::<u16>(ADC1_TP_HIGH),
            ),
            AdcUnit::Unit2 => (
                Efuse::read_field_le::<u8>(ADC2_TP_LOW),
                Efuse::read_field_le::<u16>(ADC2_TP_HIGH),
            ),
        };
        Ok(decode_two_point(unit, low, high))
    }

    fn vref(&self) -> Result<u16, EfuseError> {
        decode_vref(Efuse::read_field_le::<u8>(ADC_VREF)).ok_or(EfuseError::NotBurned)
    }
}
