use embedded_io_async::{Error as IoError, ErrorKind, Read, Write};
use log::{debug, error};

use super::event::{EventHandler, Exchange, HandlerError, HttpEvent};
use crate::constants::{HTTP_HEAD_BUFFER_SIZE, HTTP_RECV_BUFFER_SIZE};
use crate::transport::Connection;

const USER_AGENT: &str = "ESP32 HTTP Client/1.0";

/// Longest accepted chunk-size line of a chunked body
const CHUNK_LINE_MAX: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Write(ErrorKind),
    Read(ErrorKind),
    /// The peer closed the connection before the response was complete
    UnexpectedEof,
    /// The response head does not fit the head buffer
    HeadTooLarge,
    MalformedResponse,
    Handler(HandlerError),
}

impl From<HandlerError> for Error {
    fn from(e: HandlerError) -> Self {
        Error::Handler(e)
    }
}

/// What to do with a 3xx response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    /// Never follow; report a `Redirect` event to the handler
    #[default]
    Disabled,
    /// Never follow; treat the 3xx as an ordinary response
    Ignore,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
    pub query: &'a str,
    pub redirect: RedirectPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_length: Option<u64>,
}

pub struct HttpClient<'c, C> {
    conn: C,
    config: &'c RequestConfig<'c>,
    exchange: Exchange,
}

impl<'c, C: Connection> HttpClient<'c, C> {
    pub fn new(conn: C, config: &'c RequestConfig<'c>) -> Self {
        Self {
            conn,
            config,
            exchange: Exchange::default(),
        }
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// Run the request to completion. `handler` always sees `Disconnected`
    /// last, preceded by `Error` when the exchange failed.
    pub async fn perform<H: EventHandler>(&mut self, handler: &mut H) -> Result<Response, Error> {
        let result = self.run(handler).await;

        if let Err(e) = &result {
            error!("HTTP exchange with {} failed: {:?}", self.config.host, e);
            handler.on_event(&mut self.exchange, HttpEvent::Error).ok();
        }

        let fault = self.conn.take_last_error();
        handler
            .on_event(&mut self.exchange, HttpEvent::Disconnected(fault))
            .ok();

        result
    }

    async fn run<H: EventHandler>(&mut self, handler: &mut H) -> Result<Response, Error> {
        handler.on_event(&mut self.exchange, HttpEvent::Connected)?;

        self.send_request().await?;
        handler.on_event(&mut self.exchange, HttpEvent::HeadersSent)?;

        let mut head = [0u8; HTTP_HEAD_BUFFER_SIZE];
        let (head_end, total) = read_head(&mut self.conn, &mut head).await?;

        // Head without its terminating empty line
        let head_str =
            core::str::from_utf8(&head[..head_end - 4]).map_err(|_| Error::MalformedResponse)?;
        let mut lines = head_str.split("\r\n");

        let status = parse_status_line(lines.next().ok_or(Error::MalformedResponse)?)?;
        self.exchange.status = status;

        let mut content_length = None;
        let mut location = None;
        for line in lines {
            let (key, value) = line.split_once(':').ok_or(Error::MalformedResponse)?;
            let (key, value) = (key.trim(), value.trim());

            if key.eq_ignore_ascii_case("content-length") {
                content_length = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| Error::MalformedResponse)?,
                );
            } else if key.eq_ignore_ascii_case("transfer-encoding") {
                self.exchange.chunked = value
                    .split(',')
                    .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
            } else if key.eq_ignore_ascii_case("location") {
                location = Some(value);
            }

            handler.on_event(&mut self.exchange, HttpEvent::Header { key, value })?;
        }

        // Chunked framing overrides any advertised length
        if !self.exchange.chunked {
            self.exchange.content_length = content_length;
        }

        if (300..400).contains(&status) && self.config.redirect == RedirectPolicy::Disabled {
            handler.on_event(&mut self.exchange, HttpEvent::Redirect { location })?;
        }

        let mut body = BodyReader {
            conn: &mut self.conn,
            pending: &head[head_end..total],
        };

        if has_body(status) {
            if self.exchange.chunked {
                deliver_chunked(&mut body, &mut self.exchange, handler).await?;
            } else if let Some(length) = self.exchange.content_length {
                deliver_fixed(&mut body, &mut self.exchange, handler, length).await?;
            } else {
                deliver_until_close(&mut body, &mut self.exchange, handler).await?;
            }
        }

        handler.on_event(&mut self.exchange, HttpEvent::Finish)?;

        Ok(Response {
            status,
            content_length: self.exchange.content_length,
        })
    }

    async fn send_request(&mut self) -> Result<(), Error> {
        let config = self.config;
        let conn = &mut self.conn;

        // ":65535"
        let mut port = heapless::String::<6>::new();
        if config.port != 80 {
            use core::fmt::Write as _;
            let _ = write!(port, ":{}", config.port);
        }
        let separator = if config.query.is_empty() { "" } else { "?" };

        for part in [
            "GET ",
            config.path,
            separator,
            config.query,
            " HTTP/1.1\r\nHost: ",
            config.host,
            port.as_str(),
            "\r\nUser-Agent: ",
            USER_AGENT,
            "\r\nConnection: close\r\n",
        ] {
            write_all(conn, part.as_bytes()).await?;
        }
        for (key, value) in self.exchange.headers() {
            for part in [*key, ": ", *value, "\r\n"] {
                write_all(conn, part.as_bytes()).await?;
            }
        }
        write_all(conn, b"\r\n").await?;
        conn.flush().await.map_err(|e| Error::Write(e.kind()))?;

        debug!(
            "GET {}{}{} sent to {}",
            config.path, separator, config.query, config.host
        );
        Ok(())
    }
}

async fn write_all<C: Write>(conn: &mut C, mut buf: &[u8]) -> Result<(), Error> {
    while !buf.is_empty() {
        match conn.write(buf).await {
            Ok(0) => return Err(Error::Write(ErrorKind::WriteZero)),
            Ok(n) => buf = &buf[n..],
            Err(e) => return Err(Error::Write(e.kind())),
        }
    }
    Ok(())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Read until the end of the response head. Returns the offset just past the
/// empty line and the number of bytes read, which may include body bytes.
async fn read_head<C: Read>(conn: &mut C, buf: &mut [u8]) -> Result<(usize, usize), Error> {
    let mut total = 0;
    loop {
        if total == buf.len() {
            return Err(Error::HeadTooLarge);
        }
        let n = conn
            .read(&mut buf[total..])
            .await
            .map_err(|e| Error::Read(e.kind()))?;
        if n == 0 {
            return Err(Error::UnexpectedEof);
        }
        total += n;
        if let Some(end) = find_header_end(&buf[..total]) {
            return Ok((end, total));
        }
    }
}

fn parse_status_line(line: &str) -> Result<u16, Error> {
    let mut parts = line.split_whitespace();
    let version = parts.next().ok_or(Error::MalformedResponse)?;
    if !version.starts_with("HTTP/") {
        return Err(Error::MalformedResponse);
    }
    parts
        .next()
        .ok_or(Error::MalformedResponse)?
        .parse()
        .map_err(|_| Error::MalformedResponse)
}

fn has_body(status: u16) -> bool {
    !(100..200).contains(&status) && status != 204 && status != 304
}

/// Body bytes already read with the head are served before the connection
struct BodyReader<'a, C> {
    conn: &'a mut C,
    pending: &'a [u8],
}

impl<C: Read> BodyReader<'_, C> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if !self.pending.is_empty() {
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending = &self.pending[n..];
            return Ok(n);
        }
        self.conn.read(buf).await.map_err(|e| Error::Read(e.kind()))
    }

    async fn read_byte(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte).await? {
            0 => Err(Error::UnexpectedEof),
            _ => Ok(byte[0]),
        }
    }

    /// Read one CRLF-terminated line into `line`, without the terminator
    async fn read_line<'l>(&mut self, line: &'l mut [u8]) -> Result<&'l [u8], Error> {
        let mut len = 0;
        loop {
            match self.read_byte().await? {
                b'\n' => return Ok(&line[..len]),
                b'\r' => {}
                byte => {
                    *line.get_mut(len).ok_or(Error::MalformedResponse)? = byte;
                    len += 1;
                }
            }
        }
    }

    /// Consume one line of any length, returning true when it was empty
    async fn skip_line(&mut self) -> Result<bool, Error> {
        let mut empty = true;
        loop {
            match self.read_byte().await? {
                b'\n' => return Ok(empty),
                b'\r' => {}
                _ => empty = false,
            }
        }
    }
}

async fn deliver_fixed<C: Read, H: EventHandler>(
    body: &mut BodyReader<'_, C>,
    exchange: &mut Exchange,
    handler: &mut H,
    length: u64,
) -> Result<(), Error> {
    let mut chunk = [0u8; HTTP_RECV_BUFFER_SIZE];
    let mut remaining = length;
    while remaining > 0 {
        let want = (chunk.len() as u64).min(remaining) as usize;
        let n = body.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Err(Error::UnexpectedEof);
        }
        handler.on_event(exchange, HttpEvent::Data(&chunk[..n]))?;
        remaining -= n as u64;
    }
    Ok(())
}

async fn deliver_until_close<C: Read, H: EventHandler>(
    body: &mut BodyReader<'_, C>,
    exchange: &mut Exchange,
    handler: &mut H,
) -> Result<(), Error> {
    let mut chunk = [0u8; HTTP_RECV_BUFFER_SIZE];
    loop {
        let n = body.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        handler.on_event(exchange, HttpEvent::Data(&chunk[..n]))?;
    }
}

async fn deliver_chunked<C: Read, H: EventHandler>(
    body: &mut BodyReader<'_, C>,
    exchange: &mut Exchange,
    handler: &mut H,
) -> Result<(), Error> {
    let mut chunk = [0u8; HTTP_RECV_BUFFER_SIZE];
    let mut line = [0u8; CHUNK_LINE_MAX];

    loop {
        let size_line = body.read_line(&mut line).await?;
        let size_line = core::str::from_utf8(size_line).map_err(|_| Error::MalformedResponse)?;
        // Ignore chunk extensions
        let size = size_line.split(';').next().unwrap_or_default().trim();
        let size = u64::from_str_radix(size, 16).map_err(|_| Error::MalformedResponse)?;

        if size == 0 {
            // Skip trailers up to the final empty line
            while !body.skip_line().await? {}
            return Ok(());
        }

        let mut remaining = size;
        while remaining > 0 {
            let want = (chunk.len() as u64).min(remaining) as usize;
            let n = body.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(Error::UnexpectedEof);
            }
            handler.on_event(exchange, HttpEvent::Data(&chunk[..n]))?;
            remaining -= n as u64;
        }

        if !body.read_line(&mut line).await?.is_empty() {
            return Err(Error::MalformedResponse);
        }
    }
}
