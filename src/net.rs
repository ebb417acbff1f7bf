use embassy_net::{dns::DnsQueryType, tcp::TcpSocket, Stack};
use embassy_time::Duration;
use log::{debug, error};

use crate::constants::SOCKET_TIMEOUT_SECS;
use crate::transport::{Connect, Error, Transport};

/// Opens plain TCP connections through the embassy-net stack
pub struct TcpConnector<'a> {
    stack: Stack<'static>,
    rx_buffer: &'a mut [u8],
    tx_buffer: &'a mut [u8],
}

impl<'a> TcpConnector<'a> {
    pub fn new(stack: Stack<'static>, rx_buffer: &'a mut [u8], tx_buffer: &'a mut [u8]) -> Self {
        Self {
            stack,
            rx_buffer,
            tx_buffer,
        }
    }
}

impl Connect for TcpConnector<'_> {
    type Connection<'c>
        = Transport<TcpSocket<'c>>
    where
        Self: 'c;

    async fn connect(&mut self, host: &str, port: u16) -> Result<Transport<TcpSocket<'_>>, Error> {
        let addr = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|e| {
                error!("DNS query for {} failed: {:?}", host, e);
                Error::DnsLookupFailed
            })?
            .first()
            .copied()
            .ok_or(Error::DnsLookupFailed)?;

        let mut socket = TcpSocket::new(self.stack, self.rx_buffer, self.tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));

        debug!("Connecting TCP socket to {}:{}", host, port);
        socket.connect((addr, port)).await.map_err(|e| {
            error!("TCP connection to {}:{} failed: {:?}", host, port, e);
            Error::SocketConnectionError
        })?;
        debug!("TCP connected");

        Ok(Transport::new(socket))
    }
}
