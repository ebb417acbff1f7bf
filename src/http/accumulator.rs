use alloc::vec::Vec;
use log::{debug, error, info};

use super::event::{EventHandler, Exchange, HandlerError, HttpEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connected,
    Receiving,
    Finished,
    Errored,
    Disconnected,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished | Phase::Errored | Phase::Disconnected)
    }
}

enum Sink<'b> {
    /// Allocated on the first data event
    Owned(Option<Vec<u8>>),
    /// Lent by the caller, never released here
    External(&'b mut [u8]),
}

pub struct ResponseAccumulator<'b> {
    phase: Phase,
    sink: Sink<'b>,
    offset: usize,
    expected: usize,
    received: usize,
    releases: usize,
}

impl Default for ResponseAccumulator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'b> ResponseAccumulator<'b> {
    pub fn new() -> Self {
        Self::with_sink(Sink::Owned(None))
    }

    /// Accumulate into `buffer` instead of allocating
    pub fn with_buffer(buffer: &'b mut [u8]) -> Self {
        Self::with_sink(Sink::External(buffer))
    }

    fn with_sink(sink: Sink<'b>) -> Self {
        Self {
            phase: Phase::Idle,
            sink,
            offset: 0,
            expected: 0,
            received: 0,
            releases: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Write cursor into the body buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Body length accumulated when the request reached a terminal event
    pub fn received(&self) -> usize {
        self.received
    }

    /// Number of owned buffers released so far
    pub fn releases(&self) -> usize {
        self.releases
    }

    /// True while an owned buffer is allocated
    pub fn holds_buffer(&self) -> bool {
        matches!(self.sink, Sink::Owned(Some(_)))
    }

    /// Bytes accumulated so far
    pub fn body(&self) -> &[u8] {
        match &self.sink {
            Sink::Owned(Some(buffer)) => buffer,
            Sink::Owned(None) => &[],
            Sink::External(buffer) => &buffer[..self.offset],
        }
    }

    fn accumulate(&mut self, exchange: &Exchange, data: &[u8]) -> Result<(), HandlerError> {
        match &mut self.sink {
            Sink::External(buffer) => {
                let end = self.offset + data.len();
                if end > buffer.len() {
                    error!(
                        "Response exceeds the {} byte output buffer",
                        buffer.len()
                    );
                    return Err(HandlerError::Overflow);
                }
                buffer[self.offset..end].copy_from_slice(data);
            }
            Sink::Owned(slot) => {
                if slot.is_none() {
                    let length = match exchange.content_length() {
                        Some(length) if length > 0 => usize::try_from(length).map_err(|_| {
                            error!("Content length {} does not fit in memory", length);
                            HandlerError::OutOfMemory
                        })?,
                        _ => {
                            error!("Failed to allocate memory for output buffer: no content length");
                            return Err(HandlerError::MissingContentLength);
                        }
                    };
                    let mut buffer = Vec::new();
                    buffer.try_reserve_exact(length).map_err(|_| {
                        error!("Failed to allocate memory for output buffer");
                        HandlerError::OutOfMemory
                    })?;
                    self.expected = length;
                    self.offset = 0;
                    *slot = Some(buffer);
                }

                let Some(buffer) = slot.as_mut() else {
                    return Err(HandlerError::OutOfMemory);
                };
                if self.offset + data.len() > self.expected {
                    error!(
                        "Response exceeds its advertised length of {} bytes",
                        self.expected
                    );
                    return Err(HandlerError::Overflow);
                }
                buffer.extend_from_slice(data);
            }
        }

        self.offset += data.len();
        self.phase = Phase::Receiving;
        Ok(())
    }

    /// Common exit of every terminal event
    fn finalize(&mut self, phase: Phase) {
        if !self.phase.is_terminal() {
            self.received = self.offset;
        }
        if let Sink::Owned(slot) = &mut self.sink {
            if let Some(buffer) = slot.take() {
                debug!("Releasing {} byte response buffer", buffer.len());
                self.releases += 1;
            }
        }
        self.offset = 0;
        self.expected = 0;
        self.phase = phase;
    }
}

impl EventHandler for ResponseAccumulator<'_> {
    fn on_event(
        &mut self,
        exchange: &mut Exchange,
        event: HttpEvent<'_>,
    ) -> Result<(), HandlerError> {
        match event {
            HttpEvent::Error => {
                debug!("HTTP_EVENT_ERROR");
                self.finalize(Phase::Errored);
            }
            HttpEvent::Connected => {
                debug!("HTTP_EVENT_ON_CONNECTED");
                self.phase = Phase::Connected;
            }
            HttpEvent::HeadersSent => debug!("HTTP_EVENT_HEADER_SENT"),
            HttpEvent::Header { key, value } => {
                debug!("HTTP_EVENT_ON_HEADER, key={}, value={}", key, value);
            }
            HttpEvent::Data(data) => {
                debug!("HTTP_EVENT_ON_DATA, len={}", data.len());
                // Chunked bodies are not accumulated
                if !exchange.is_chunked() {
                    self.accumulate(exchange, data)?;
                }
            }
            HttpEvent::Finish => {
                debug!("HTTP_EVENT_ON_FINISH, status={}", exchange.status());
                self.finalize(Phase::Finished);
            }
            HttpEvent::Disconnected(fault) => {
                info!("HTTP_EVENT_DISCONNECTED");
                if let Some(fault) = fault {
                    info!("Last transport error: {:?}", fault.kind);
                    if let Some(code) = fault.secure_code {
                        info!("Last secure transport failure: {:#x}", code);
                    }
                }
                self.finalize(Phase::Disconnected);
            }
            HttpEvent::Redirect { location } => {
                debug!("HTTP_EVENT_REDIRECT, location={:?}", location);
                exchange.set_header("From", "user@example.com");
                exchange.set_header("Accept", "text/html");
            }
        }
        Ok(())
    }
}

impl Drop for ResponseAccumulator<'_> {
    fn drop(&mut self) {
        if self.holds_buffer() {
            self.finalize(Phase::Disconnected);
        }
    }
}
