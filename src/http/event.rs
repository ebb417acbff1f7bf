use heapless::Vec;

use crate::transport::TransportFault;

/// Extra request headers a handler may add during an exchange
pub const MAX_EXTRA_HEADERS: usize = 4;

/// Events delivered to an [`EventHandler`] during one request, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpEvent<'a> {
    /// The exchange failed; no more data will arrive
    Error,
    Connected,
    HeadersSent,
    Header { key: &'a str, value: &'a str },
    Data(&'a [u8]),
    /// The whole body was delivered
    Finish,
    /// The connection is closed, always the last event
    Disconnected(Option<TransportFault>),
    /// A 3xx response that will not be followed
    Redirect { location: Option<&'a str> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerError {
    /// A response buffer was needed but no usable content length was advertised
    MissingContentLength,
    /// The response buffer could not be allocated
    OutOfMemory,
    /// More body bytes arrived than the buffer can hold
    Overflow,
}

/// Live state of the in-flight response, as seen by the handler
#[derive(Debug, Default)]
pub struct Exchange {
    pub(crate) status: u16,
    pub(crate) content_length: Option<u64>,
    pub(crate) chunked: bool,
    pub(crate) headers: Vec<(&'static str, &'static str), MAX_EXTRA_HEADERS>,
}

impl Exchange {
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Advertised body length, `None` when absent or chunked
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    /// Set an extra request header, replacing any previous value
    pub fn set_header(&mut self, key: &'static str, value: &'static str) -> bool {
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            entry.1 = value;
            return true;
        }
        self.headers.push((key, value)).is_ok()
    }

    pub fn headers(&self) -> &[(&'static str, &'static str)] {
        &self.headers
    }
}

/// Receives the events of one HTTP exchange. An error aborts the exchange.
pub trait EventHandler {
    fn on_event(&mut self, exchange: &mut Exchange, event: HttpEvent<'_>)
        -> Result<(), HandlerError>;
}
