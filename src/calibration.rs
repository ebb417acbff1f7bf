use log::{info, warn};

/// Reference voltages of the two-point calibration in millivolts
const TP_LOW_MV: u32 = 150;
const TP_HIGH_MV: u32 = 850;

/// Codes per conversion at 12-bit resolution
const ADC_12_BIT_RES: u64 = 4096;

/// Fixed-point scale of `coeff_a`
const COEFF_A_SCALE: u64 = 65536;
const COEFF_A_ROUND: u64 = COEFF_A_SCALE / 2;

const ADC1_TP_ATTEN_SCALE: [u32; 4] = [65504, 86975, 120389, 224310];
const ADC2_TP_ATTEN_SCALE: [u32; 4] = [65467, 86861, 120416, 224708];
const ADC1_TP_ATTEN_OFFSET: [u32; 4] = [0, 1, 27, 54];
const ADC2_TP_ATTEN_OFFSET: [u32; 4] = [0, 9, 26, 66];

const ADC1_VREF_ATTEN_SCALE: [u32; 4] = [57431, 76236, 105481, 196602];
const ADC2_VREF_ATTEN_SCALE: [u32; 4] = [57236, 76175, 105678, 197170];
const ADC1_VREF_ATTEN_OFFSET: [u32; 4] = [75, 78, 107, 142];
const ADC2_VREF_ATTEN_OFFSET: [u32; 4] = [63, 66, 89, 128];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdcUnit {
    Unit1,
    Unit2,
}

/// Input attenuation, which sets the measurable voltage range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attenuation {
    /// ~100-950 mV
    Db0,
    /// ~100-1250 mV
    Db2_5,
    /// ~150-1750 mV
    Db6,
    /// ~150-2450 mV
    Db11,
}

impl Attenuation {
    fn index(self) -> usize {
        match self {
            Attenuation::Db0 => 0,
            Attenuation::Db2_5 => 1,
            Attenuation::Db6 => 2,
            Attenuation::Db11 => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitWidth {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl BitWidth {
    pub fn bits(self) -> u32 {
        match self {
            BitWidth::Bits9 => 9,
            BitWidth::Bits10 => 10,
            BitWidth::Bits11 => 11,
            BitWidth::Bits12 => 12,
        }
    }

    /// Largest raw code the converter produces at this width
    pub fn max_code(self) -> u16 {
        ((1u32 << self.bits()) - 1) as u16
    }
}

/// Which calibration data a table was built from, best first
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationSource {
    TwoPoint,
    EfuseVref,
    DefaultVref,
}

/// Raw codes measured at 150 mV and 850 mV during factory test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TwoPoint {
    pub low: u16,
    pub high: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EfuseError {
    /// The value was never burned on this chip
    NotBurned,
    /// The eFuse block could not be read
    Read,
}

/// Access to factory calibration values
pub trait EfuseSource {
    fn two_point(&self, unit: AdcUnit) -> Result<TwoPoint, EfuseError>;

    /// Measured internal reference voltage in millivolts
    fn vref(&self) -> Result<u16, EfuseError>;
}

/// Linear characterization of one ADC configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationTable {
    unit: AdcUnit,
    attenuation: Attenuation,
    width: BitWidth,
    coeff_a: u32,
    coeff_b: i32,
    source: CalibrationSource,
}

impl CalibrationTable {
    pub fn unit(&self) -> AdcUnit {
        self.unit
    }

    pub fn attenuation(&self) -> Attenuation {
        self.attenuation
    }

    pub fn width(&self) -> BitWidth {
        self.width
    }

    pub fn source(&self) -> CalibrationSource {
        self.source
    }

    /// True when built from the default reference voltage instead of
    /// per-device calibration. Readings stay usable with reduced accuracy.
    pub fn is_degraded(&self) -> bool {
        self.source == CalibrationSource::DefaultVref
    }

    /// Convert a raw code at the table's bit width to millivolts
    pub fn raw_to_millivolts(&self, raw: u16) -> u32 {
        let shift = 12 - self.width.bits();
        let raw12 = u64::from(raw) << shift;
        let scaled = (u64::from(self.coeff_a) * raw12 + COEFF_A_ROUND) / COEFF_A_SCALE;
        (scaled as i64 + i64::from(self.coeff_b)).max(0) as u32
    }
}

/// Characterize an ADC configuration.
///
/// Never fails: a missing or unreadable eFuse value moves on to the next
/// source, ending with `default_vref_mv`.
pub fn characterize<E: EfuseSource>(
    efuse: &E,
    unit: AdcUnit,
    attenuation: Attenuation,
    width: BitWidth,
    default_vref_mv: u16,
) -> CalibrationTable {
    let atten = attenuation.index();

    let (coeff_a, coeff_b, source) = match efuse.two_point(unit) {
        Ok(tp) if tp.high > tp.low => {
            let (scales, offsets) = match unit {
                AdcUnit::Unit1 => (&ADC1_TP_ATTEN_SCALE, &ADC1_TP_ATTEN_OFFSET),
                AdcUnit::Unit2 => (&ADC2_TP_ATTEN_SCALE, &ADC2_TP_ATTEN_OFFSET),
            };
            let delta_x = u64::from(tp.high - tp.low);
            let delta_v = u64::from(TP_HIGH_MV - TP_LOW_MV);
            let coeff_a = (delta_v * u64::from(scales[atten]) + delta_x / 2) / delta_x;
            let high_term = (delta_v * u64::from(tp.high) + delta_x / 2) / delta_x;
            let coeff_b = TP_HIGH_MV as i64 - high_term as i64 + i64::from(offsets[atten]);
            (coeff_a as u32, coeff_b as i32, CalibrationSource::TwoPoint)
        }
        two_point => {
            if let Ok(tp) = two_point {
                warn!("Ignoring inconsistent two point eFuse values: {:?}", tp);
            }
            let (vref, source) = match efuse.vref() {
                Ok(vref) => (vref, CalibrationSource::EfuseVref),
                Err(_) => (default_vref_mv, CalibrationSource::DefaultVref),
            };
            let (scales, offsets) = match unit {
                AdcUnit::Unit1 => (&ADC1_VREF_ATTEN_SCALE, &ADC1_VREF_ATTEN_OFFSET),
                AdcUnit::Unit2 => (&ADC2_VREF_ATTEN_SCALE, &ADC2_VREF_ATTEN_OFFSET),
            };
            let coeff_a = u64::from(vref) * u64::from(scales[atten]) / ADC_12_BIT_RES;
            (coeff_a as u32, offsets[atten] as i32, source)
        }
    };

    match source {
        CalibrationSource::TwoPoint => info!("Characterized using Two Point Value"),
        CalibrationSource::EfuseVref => info!("Characterized using eFuse Vref"),
        CalibrationSource::DefaultVref => warn!(
            "Characterized using Default Vref ({} mV), readings are less accurate",
            default_vref_mv
        ),
    }

    CalibrationTable {
        unit,
        attenuation,
        width,
        coeff_a,
        coeff_b,
        source,
    }
}

/// Log which calibration values are burned into eFuse
pub fn log_efuse_support<E: EfuseSource>(efuse: &E, unit: AdcUnit) {
    match efuse.two_point(unit) {
        Ok(_) => info!("eFuse Two Point: Supported"),
        Err(_) => info!("eFuse Two Point: NOT supported"),
    }
    match efuse.vref() {
        Ok(_) => info!("eFuse Vref: Supported"),
        Err(_) => info!("eFuse Vref: NOT supported"),
    }
}

/// Nominal values the fused calibration deltas are relative to
const VREF_NOMINAL_MV: i32 = 1100;
const VREF_STEP_MV: i32 = 7;
const TP_STEP: i32 = 4;
const ADC1_TP_LOW_NOMINAL: i32 = 278;
const ADC1_TP_HIGH_NOMINAL: i32 = 3265;
const ADC2_TP_LOW_NOMINAL: i32 = 421;
const ADC2_TP_HIGH_NOMINAL: i32 = 3406;

// The most significant of `bits` is the sign
fn sign_magnitude(raw: u16, bits: u32) -> i32 {
    let magnitude = i32::from(raw & ((1 << (bits - 1)) - 1));
    if raw & (1 << (bits - 1)) != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode the 5-bit eFuse reference voltage field, `None` when not burned
pub fn decode_vref(raw: u8) -> Option<u16> {
    if raw == 0 {
        return None;
    }
    let delta = sign_magnitude(u16::from(raw), 5);
    Some((VREF_NOMINAL_MV + delta * VREF_STEP_MV) as u16)
}

/// Decode the 7-bit low and 9-bit high two-point fields of `unit`
pub fn decode_two_point(unit: AdcUnit, low: u8, high: u16) -> TwoPoint {
    let (low_nominal, high_nominal) = match unit {
        AdcUnit::Unit1 => (ADC1_TP_LOW_NOMINAL, ADC1_TP_HIGH_NOMINAL),
        AdcUnit::Unit2 => (ADC2_TP_LOW_NOMINAL, ADC2_TP_HIGH_NOMINAL),
    };
    TwoPoint {
        low: (low_nominal + sign_magnitude(u16::from(low), 7) * TP_STEP) as u16,
        high: (high_nominal + sign_magnitude(high, 9) * TP_STEP) as u16,
    }
}
