//! Datagram transport as a trait, grounded on the teacher's direct
//! `UdpSocket` use in
//! `Connection::new`/`open`. `Session`/`Endpoint` are generic over
//! `Transmission` rather than boxing it, so tests can substitute an
//! in-memory channel pair instead of binding real ports without paying for
//! dynamic dispatch on every send.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::error::QuicResult;

pub trait Transmission: std::fmt::Debug + Send + Sync {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> impl std::future::Future<Output = QuicResult<()>> + Send;
    fn recv_from(&self, buf: &mut [u8]) -> impl std::future::Future<Output = QuicResult<(usize, SocketAddr)>> + Send;
    fn local_addr(&self) -> QuicResult<SocketAddr>;
}

/// Lets `Endpoint` hand every `Session` it multiplexes an `Arc<T>` of the
/// one bound socket, the way the teacher's server keeps a single
/// `quic_transmission_t` shared across every `quic_session_t` in its
/// connection-id-keyed tree rather than one socket per session.
impl<T: Transmission> Transmission for Arc<T> {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> impl std::future::Future<Output = QuicResult<()>> + Send {
        T::send_to(self, buf, target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> impl std::future::Future<Output = QuicResult<(usize, SocketAddr)>> + Send {
        T::recv_from(self, buf)
    }

    fn local_addr(&self) -> QuicResult<SocketAddr> {
        T::local_addr(self)
    }
}

#[derive(Debug)]
pub struct UdpTransmission {
    socket: UdpSocket,
}

impl UdpTransmission {
    pub async fn bind(local_addr: SocketAddr) -> QuicResult<Self> {
        Ok(Self { socket: UdpSocket::bind(local_addr).await? })
    }
}

impl Transmission for UdpTransmission {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> QuicResult<()> {
        self.socket.send_to(buf, target).await?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> QuicResult<(usize, SocketAddr)> {
        Ok(self.socket.recv_from(buf).await?)
    }

    fn local_addr(&self) -> QuicResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn two_bound_sockets_exchange_a_datagram() {
        let a = UdpTransmission::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpTransmission::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(b"ping", b_addr).await.unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, a.local_addr().unwrap());
    }
}
