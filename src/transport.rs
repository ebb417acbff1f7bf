#![allow(async_fn_in_trait)]

use embedded_io_async::{Error as IoError, ErrorKind, ErrorType, Read, Write};

const MAX_RETRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    DnsLookupFailed,
    SocketConnectionError,
}

/// Last low-level failure seen on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportFault {
    pub kind: ErrorKind,
    /// Error code of a secure layer wrapped by the connection, if any
    pub secure_code: Option<i32>,
}

/// An established byte stream to the reporting service
pub trait Connection: Read + Write {
    /// Return and clear the last recorded failure
    fn take_last_error(&mut self) -> Option<TransportFault> {
        None
    }
}

/// Opens connections to a host
pub trait Connect {
    type Connection<'a>: Connection
    where
        Self: 'a;

    async fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection<'_>, Error>;
}

/// Wraps a socket, retrying transient read/write failures and recording the
/// last error for diagnostics
pub struct Transport<S> {
    pub session: S,
    last_error: Option<ErrorKind>,
}

impl<S> Transport<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            last_error: None,
        }
    }
}

// Errors after which the peer will not send or accept anything more
fn is_terminal(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::NotConnected
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
    )
}

impl<S: ErrorType> ErrorType for Transport<S> {
    type Error = S::Error;
}

impl<S: Read> Read for Transport<S> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, S::Error> {
        let mut attempt = 0;
        loop {
            match self.session.read(buf).await {
                Ok(n) => {
                    log::debug!("Transport read: {} bytes", n);
                    return Ok(n);
                }
                Err(e) => {
                    attempt += 1;
                    self.last_error = Some(e.kind());
                    if is_terminal(e.kind()) || attempt >= MAX_RETRIES {
                        return Err(e);
                    }
                    log::warn!("read attempt {} failed: {:?}", attempt, e);
                }
            }
        }
    }
}

impl<S: Write> Write for Transport<S> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, S::Error> {
        let mut attempt = 0;
        loop {
            match self.session.write(buf).await {
                Ok(n) => return Ok(n),
                Err(e) => {
                    attempt += 1;
                    self.last_error = Some(e.kind());
                    if is_terminal(e.kind()) || attempt >= MAX_RETRIES {
                        return Err(e);
                    }
                    log::warn!("write attempt {} failed: {:?}", attempt, e);
                }
            }
        }
    }

    async fn flush(&mut self) -> Result<(), S::Error> {
        self.session.flush().await.map_err(|e| {
            self.last_error = Some(e.kind());
            e
        })
    }
}

impl<S: Read + Write> Connection for Transport<S> {
    fn take_last_error(&mut self) -> Option<TransportFault> {
        self.last_error.take().map(|kind| TransportFault {
            kind,
            secure_code: None,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_time::Instant;

    /// In-memory peer: each read returns the next scripted segment, writes
    /// are captured
    pub(crate) struct ScriptedStream {
        pub segments: Vec<Result<Vec<u8>, ErrorKind>>,
        pub next: usize,
        pub offset: usize,
        pub written: Vec<u8>,
    }

    impl ScriptedStream {
        pub fn new(segments: Vec<Result<Vec<u8>, ErrorKind>>) -> Self {
            Self {
                segments,
                next: 0,
                offset: 0,
                written: Vec::new(),
            }
        }
    }

    impl ErrorType for ScriptedStream {
        type Error = ErrorKind;
    }

    impl Read for ScriptedStream {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
            let Some(segment) = self.segments.get(self.next) else {
                return Ok(0);
            };
            let segment = match segment {
                Ok(segment) => segment,
                Err(kind) => {
                    self.next += 1;
                    return Err(*kind);
                }
            };
            let rest = &segment[self.offset..];
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.offset += n;
            if self.offset == segment.len() {
                self.next += 1;
                self.offset = 0;
            }
            Ok(n)
        }
    }

    impl Write for ScriptedStream {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    /// Connector handing out scripted responses, recording each request
    pub(crate) struct ScriptedConnector {
        pub responses: Vec<Vec<Result<Vec<u8>, ErrorKind>>>,
        pub requests: Vec<Vec<u8>>,
        pub connected_at: Vec<Instant>,
        pub refuse: bool,
    }

    impl ScriptedConnector {
        pub fn new(responses: Vec<Vec<Result<Vec<u8>, ErrorKind>>>) -> Self {
            Self {
                responses,
                requests: Vec::new(),
                connected_at: Vec::new(),
                refuse: false,
            }
        }
    }

    pub(crate) struct ScriptedConnection<'a> {
        transport: Transport<ScriptedStream>,
        requests: &'a mut Vec<Vec<u8>>,
    }

    impl Drop for ScriptedConnection<'_> {
        fn drop(&mut self) {
            let written = core::mem::take(&mut self.transport.session.written);
            self.requests.push(written);
        }
    }

    impl ErrorType for ScriptedConnection<'_> {
        type Error = ErrorKind;
    }

    impl Read for ScriptedConnection<'_> {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
            self.transport.read(buf).await
        }
    }

    impl Write for ScriptedConnection<'_> {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
            self.transport.write(buf).await
        }
    }

    impl Connection for ScriptedConnection<'_> {
        fn take_last_error(&mut self) -> Option<TransportFault> {
            self.transport.take_last_error()
        }
    }

    impl Connect for ScriptedConnector {
        type Connection<'a> = ScriptedConnection<'a>;

        async fn connect(&mut self, _host: &str, _port: u16) -> Result<ScriptedConnection<'_>, Error> {
            self.connected_at.push(Instant::now());
            if self.refuse || self.responses.is_empty() {
                return Err(Error::SocketConnectionError);
            }
            let segments = self.responses.remove(0);
            Ok(ScriptedConnection {
                transport: Transport::new(ScriptedStream::new(segments)),
                requests: &mut self.requests,
            })
        }
    }

    #[test]
    fn test_read_retries_transient_errors() {
        let stream = ScriptedStream::new(vec![Err(ErrorKind::Interrupted), Ok(b"ok".to_vec())]);
        let mut transport = Transport::new(stream);
        let mut buf = [0u8; 8];

        let n = block_on(transport.read(&mut buf)).unwrap();
        assert_eq!(&buf[..n], b"ok");
        let fault = transport.take_last_error().unwrap();
        assert_eq!(fault.kind, ErrorKind::Interrupted);
        assert_eq!(fault.secure_code, None);
        assert_eq!(transport.take_last_error(), None);
    }

    #[test]
    fn test_read_does_not_retry_reset() {
        let stream = ScriptedStream::new(vec![
            Err(ErrorKind::ConnectionReset),
            Ok(b"late".to_vec()),
        ]);
        let mut transport = Transport::new(stream);
        let mut buf = [0u8; 8];

        assert_eq!(block_on(transport.read(&mut buf)), Err(ErrorKind::ConnectionReset));
        assert_eq!(transport.take_last_error().unwrap().kind, ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_read_gives_up_after_max_retries() {
        let stream = ScriptedStream::new(vec![
            Err(ErrorKind::Other),
            Err(ErrorKind::Other),
            Err(ErrorKind::Other),
            Ok(b"never".to_vec()),
        ]);
        let mut transport = Transport::new(stream);
        let mut buf = [0u8; 8];

        assert_eq!(block_on(transport.read(&mut buf)), Err(ErrorKind::Other));
    }
}
