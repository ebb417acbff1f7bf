use embassy_time::{Duration, Instant, Timer};
use log::{debug, error, info};

use crate::http::{
    self, EventHandler, HttpClient, RedirectPolicy, RequestConfig, Response, ResponseAccumulator,
};
use crate::transport::{self, Connect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    Transport(transport::Error),
    Http(http::Error),
}

impl From<transport::Error> for ReportError {
    fn from(e: transport::Error) -> Self {
        ReportError::Transport(e)
    }
}

impl From<http::Error> for ReportError {
    fn from(e: http::Error) -> Self {
        ReportError::Http(e)
    }
}

pub struct HttpReporter<C> {
    connector: C,
    host: &'static str,
    port: u16,
    path: &'static str,
    min_interval: Duration,
    last_start: Option<Instant>,
}

impl<C: Connect> HttpReporter<C> {
    /// `min_interval` is the shortest allowed time between the starts of two
    /// consecutive reports
    pub fn new(
        connector: C,
        host: &'static str,
        port: u16,
        path: &'static str,
        min_interval: Duration,
    ) -> Self {
        Self {
            connector,
            host,
            port,
            path,
            min_interval,
            last_start: None,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Send `query`, collecting the response into a buffer sized from its
    /// advertised length
    pub async fn report(&mut self, query: &str) -> Result<Response, ReportError> {
        let mut accumulator = ResponseAccumulator::new();
        self.exchange(query, &mut accumulator).await
    }

    /// Send `query`, collecting the response into `buffer`. Returns the
    /// response and the number of body bytes written to `buffer`.
    pub async fn report_into(
        &mut self,
        query: &str,
        buffer: &mut [u8],
    ) -> Result<(Response, usize), ReportError> {
        let mut accumulator = ResponseAccumulator::with_buffer(buffer);
        let response = self.exchange(query, &mut accumulator).await?;
        Ok((response, accumulator.received()))
    }

    async fn exchange<H: EventHandler>(
        &mut self,
        query: &str,
        handler: &mut H,
    ) -> Result<Response, ReportError> {
        if let Some(last) = self.last_start {
            let earliest = last + self.min_interval;
            let wait = earliest.saturating_duration_since(Instant::now());
            if wait > Duration::from_ticks(0) {
                debug!("Delaying report by {} ms", wait.as_millis());
                Timer::at(earliest).await;
            }
        }
        self.last_start = Some(Instant::now());

        let config = RequestConfig {
            host: self.host,
            port: self.port,
            path: self.path,
            query,
            redirect: RedirectPolicy::Disabled,
        };

        let conn = self.connector.connect(self.host, self.port).await.map_err(|e| {
            error!("Failed to connect to {}:{}: {:?}", config.host, config.port, e);
            ReportError::from(e)
        })?;

        let mut client = HttpClient::new(conn, &config);
        match client.perform(handler).await {
            Ok(response) => {
                info!(
                    "HTTP GET Status = {}, content_length = {:?}",
                    response.status, response.content_length
                );
                Ok(response)
            }
            Err(e) => {
                error!("HTTP GET request failed: {:?}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::ScriptedConnector;
    use embassy_futures::block_on;
    use embedded_io_async::ErrorKind;

    fn ok_response(body: &[u8]) -> Vec<Result<Vec<u8>, ErrorKind>> {
        let mut response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len())
            .into_bytes();
        response.extend_from_slice(body);
        vec![Ok(response)]
    }

    fn reporter(connector: ScriptedConnector, min_interval: Duration) -> HttpReporter<ScriptedConnector> {
        HttpReporter::new(connector, "api.thingspeak.com", 80, "/update", min_interval)
    }

    #[test]
    fn test_report_sends_query_and_returns_status() {
        let connector = ScriptedConnector::new(vec![ok_response(b"42")]);
        let mut reporter = reporter(connector, Duration::from_millis(0));

        let response = block_on(reporter.report("api_key=KEY&field1=24")).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_length, Some(2));

        let requests = &reporter.connector().requests;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with(b"GET /update?api_key=KEY&field1=24 HTTP/1.1\r\n"));
    }

    #[test]
    fn test_report_into_fills_caller_buffer() {
        let connector = ScriptedConnector::new(vec![ok_response(b"1234")]);
        let mut reporter = reporter(connector, Duration::from_millis(0));
        let mut buffer = [0u8; 16];

        let (response, len) = block_on(reporter.report_into("q=1", &mut buffer)).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(&buffer[..len], b"1234");
    }

    #[test]
    fn test_report_starts_are_spaced() {
        let min_interval = Duration::from_millis(50);
        let connector = ScriptedConnector::new(vec![
            ok_response(b"1"),
            ok_response(b"2"),
            ok_response(b"3"),
        ]);
        let mut reporter = reporter(connector, min_interval);

        for _ in 0..3 {
            block_on(reporter.report("q=1")).unwrap();
        }

        let starts = &reporter.connector().connected_at;
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= min_interval);
        }
    }

    #[test]
    fn test_failed_connect_still_counts_as_a_start() {
        let min_interval = Duration::from_millis(50);
        let mut connector = ScriptedConnector::new(vec![ok_response(b"1")]);
        connector.refuse = true;
        let mut reporter = reporter(connector, min_interval);

        assert_eq!(
            block_on(reporter.report("q=1")),
            Err(ReportError::Transport(transport::Error::SocketConnectionError))
        );

        reporter.connector.refuse = false;
        block_on(reporter.report("q=1")).unwrap();

        let starts = &reporter.connector().connected_at;
        assert!(starts[1] - starts[0] >= min_interval);
    }

    #[test]
    fn test_http_failure_is_reported() {
        let connector = ScriptedConnector::new(vec![vec![Err(ErrorKind::ConnectionReset)]]);
        let mut reporter = reporter(connector, Duration::from_millis(0));

        assert_eq!(
            block_on(reporter.report("q=1")),
            Err(ReportError::Http(http::Error::Read(ErrorKind::ConnectionReset)))
        );
    }
}
