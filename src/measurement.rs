use embassy_time::{Duration, Timer};
use log::{error, info, warn};

use crate::analog::{AnalogError, AnalogReading, AnalogSampler, ChannelConfig, GasSensor, RawAdc};
use crate::calibration::{AdcUnit, Attenuation, BitWidth};
use crate::constants::*;
use crate::dht::{DhtBus, DigitalReading, Dht11};
use crate::http::Response;
use crate::query::{report_fields, QueryBuffer, QueryError};
use crate::reporter::{HttpReporter, ReportError};
use crate::transport::Connect;

/// MQ-2 on GPIO34 and MQ-3 on GPIO35
pub const GAS_CHANNELS: [ChannelConfig; 2] = [
    ChannelConfig {
        channel: 6,
        attenuation: Attenuation::Db11,
        width: BitWidth::Bits12,
        unit: AdcUnit::Unit1,
    },
    ChannelConfig {
        channel: 7,
        attenuation: Attenuation::Db11,
        width: BitWidth::Bits12,
        unit: AdcUnit::Unit1,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Encode(QueryError),
    Report(ReportError),
}

/// Outcome of one reporting cycle
#[derive(Debug, Clone, Copy)]
pub struct Cycle {
    pub digital: DigitalReading,
    pub analog: [Result<AnalogReading, AnalogError>; 2],
    /// Gas resistance ratios as reported, 0.0 when not measurable
    pub ratios: [f32; 2],
    pub report: Result<Response, Error>,
}

pub struct Measurement<B, A, C> {
    dht: Dht11<B>,
    sampler: AnalogSampler<A>,
    gas_sensor: GasSensor,
    reporter: HttpReporter<C>,
    query: QueryBuffer<QUERY_BUFFER_SIZE>,
    api_key: &'static str,
    interval: Duration,
}

impl<B: DhtBus, A: RawAdc, C: Connect> Measurement<B, A, C> {
    pub fn new(
        dht: Dht11<B>,
        sampler: AnalogSampler<A>,
        reporter: HttpReporter<C>,
        api_key: &'static str,
        interval: Duration,
    ) -> Self {
        Self {
            dht,
            sampler,
            gas_sensor: GasSensor::new(GAS_SENSOR_SUPPLY_MV),
            reporter,
            query: QueryBuffer::new(),
            api_key,
            interval,
        }
    }

    /// Read every sensor and send one report. Sensor failures do not stop the
    /// cycle, the last good or zero values are sent instead.
    pub async fn take(&mut self) -> Cycle {
        let digital = self.dht.poll();

        let analog = GAS_CHANNELS.map(|channel| self.sampler.sample(&channel, ADC_SAMPLE_COUNT));
        let mut ratios = [0.0f32; 2];
        for (i, reading) in analog.iter().enumerate() {
            let ratio = reading
                .as_ref()
                .map_err(|e| *e)
                .and_then(|reading| self.gas_sensor.resistance_ratio(reading));
            match ratio {
                Ok(ratio) => ratios[i] = ratio,
                Err(e) => warn!(
                    "Gas sensor on channel {} not measurable: {:?}",
                    GAS_CHANNELS[i].channel, e
                ),
            }
        }

        info!(
            "Temperature: {}C, humidity: {}%, MQ-2: {:.3}, MQ-3: {:.3}",
            digital.temperature, digital.humidity, ratios[0], ratios[1]
        );

        let report = self.report(&digital, &ratios).await;

        Cycle {
            digital,
            analog,
            ratios,
            report,
        }
    }

    async fn report(&mut self, digital: &DigitalReading, ratios: &[f32; 2]) -> Result<Response, Error> {
        let fields = report_fields(
            self.api_key,
            digital.temperature,
            digital.humidity,
            ratios[0],
            ratios[1],
        );
        self.query.encode(&fields).map_err(|e| {
            error!("Failed to encode query, skipping report: {:?}", e);
            Error::Encode(e)
        })?;

        self.reporter
            .report(self.query.as_str())
            .await
            .map_err(Error::Report)
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.take().await;
            Timer::after(self.interval).await;
        }
    }

    pub fn reporter(&self) -> &HttpReporter<C> {
        &self.reporter
    }
}
