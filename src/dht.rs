use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtError {
    /// The sensor did not drive the expected level in time
    Timeout,
    /// The frame checksum does not match its payload
    Checksum,
    /// The data pin could not be driven or sampled
    Bus,
}

/// Outcome of the most recent poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// Polled before the sensor's minimum interval, or never polled
    Stale,
    Error(DhtError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalReading {
    /// Degrees Celsius
    pub temperature: i32,
    /// Percent relative humidity
    pub humidity: i32,
    pub status: Status,
}

impl Default for DigitalReading {
    fn default() -> Self {
        Self {
            temperature: 0,
            humidity: 0,
            status: Status::Stale,
        }
    }
}

/// Reads one raw 40-bit frame from the sensor
pub trait DhtBus {
    fn read_frame(&mut self) -> Result<[u8; 5], DhtError>;
}

/// Decode a raw frame into `(temperature, humidity)`
pub fn decode_frame(frame: &[u8; 5]) -> Result<(i32, i32), DhtError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(DhtError::Checksum);
    }

    let humidity = i32::from(frame[0]);
    let mut temperature = i32::from(frame[2]);
    if frame[3] & 0x80 != 0 {
        temperature = -temperature;
    }

    Ok((temperature, humidity))
}

pub struct Dht11<B> {
    bus: B,
    reading: DigitalReading,
    min_interval: Duration,
    last_poll: Option<Instant>,
}

impl<B: DhtBus> Dht11<B> {
    pub fn new(bus: B, min_interval: Duration) -> Self {
        Self {
            bus,
            reading: DigitalReading::default(),
            min_interval,
            last_poll: None,
        }
    }

    /// Last reading returned by [`Dht11::poll`]
    pub fn reading(&self) -> DigitalReading {
        self.reading
    }

    /// Poll the sensor. Temperature and humidity only change on a
    /// successful frame; the status always reflects this poll.
    pub fn poll(&mut self) -> DigitalReading {
        let now = Instant::now();
        if let Some(last) = self.last_poll {
            if now.duration_since(last) < self.min_interval {
                warn!("DHT11 polled too soon, keeping previous reading");
                self.reading.status = Status::Stale;
                return self.reading;
            }
        }
        self.last_poll = Some(now);

        match self.bus.read_frame().and_then(|frame| decode_frame(&frame)) {
            Ok((temperature, humidity)) => {
                debug!("DHT11: temperature={}C humidity={}%", temperature, humidity);
                self.reading = DigitalReading {
                    temperature,
                    humidity,
                    status: Status::Ok,
                };
            }
            Err(e) => {
                warn!("DHT11 read failed: {:?}", e);
                self.reading.status = Status::Error(e);
            }
        }

        self.reading
    }
}

/// Host start signal length, the DHT11 needs at least 18 ms
const START_LOW_MS: u32 = 20;
/// Upper bound for any single level of the response
const LEVEL_TIMEOUT_US: u64 = 100;
/// A high pulse longer than this encodes a one (zero ~26 us, one ~70 us)
const ONE_THRESHOLD_US: u64 = 50;

/// Bit-banged single-wire bus on an open-drain pin with pull-up
pub struct Dht11Pin<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> Dht11Pin<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(mut pin: P, delay: D) -> Self {
        // Idle level, the sensor waits for a falling edge
        pin.set_high().ok();
        Self { pin, delay }
    }

    fn wait_for_level(&mut self, high: bool, timeout_us: u64) -> Result<u64, DhtError> {
        let start = Instant::now();
        loop {
            if self.pin.is_high().map_err(|_| DhtError::Bus)? == high {
                return Ok(start.elapsed().as_micros());
            }
            if start.elapsed().as_micros() > timeout_us {
                return Err(DhtError::Timeout);
            }
        }
    }

    fn read_bits(&mut self) -> Result<[u8; 5], DhtError> {
        // Sensor response: ~80 us low then ~80 us high
        self.wait_for_level(false, LEVEL_TIMEOUT_US)?;
        self.wait_for_level(true, LEVEL_TIMEOUT_US)?;
        self.wait_for_level(false, LEVEL_TIMEOUT_US)?;

        let mut frame = [0u8; 5];
        for byte in frame.iter_mut() {
            for _ in 0..8 {
                self.wait_for_level(true, LEVEL_TIMEOUT_US)?;
                let high_us = self.wait_for_level(false, LEVEL_TIMEOUT_US)?;
                *byte <<= 1;
                if high_us > ONE_THRESHOLD_US {
                    *byte |= 1;
                }
            }
        }

        Ok(frame)
    }
}

impl<P, D> DhtBus for Dht11Pin<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn read_frame(&mut self) -> Result<[u8; 5], DhtError> {
        self.pin.set_low().map_err(|_| DhtError::Bus)?;
        self.delay.delay_ms(START_LOW_MS);
        self.pin.set_high().map_err(|_| DhtError::Bus)?;

        // Bit timing is in tens of microseconds, keep interrupts out
        critical_section::with(|_| self.read_bits())
    }
}
