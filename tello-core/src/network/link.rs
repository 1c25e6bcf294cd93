//! The control-port UDP socket.
//!
//! Owns the outbound sequence counter. The counter wraps at 16 bits;
//! the stick heartbeat goes out with sequence 0 and does not advance it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::TelloError;
use crate::packet::{Frame, handshake_request};

#[derive(Debug)]
pub struct ControlLink {
    socket: UdpSocket,
    remote: SocketAddr,
    sequence: AtomicU16,
    bytes_sent: AtomicU64,
}

impl ControlLink {
    pub async fn bind(local: SocketAddr, remote: SocketAddr) -> Result<Self, TelloError> {
        let socket = UdpSocket::bind(local).await?;
        Ok(Self::new(socket, remote))
    }

    /// Wrap an already-bound socket targeting `remote`.
    pub fn new(socket: UdpSocket, remote: SocketAddr) -> Self {
        Self {
            socket,
            remote,
            sequence: AtomicU16::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    /// Send `frame` with the next sequence number.
    pub async fn send(&self, frame: &Frame) -> Result<u16, TelloError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.send_with_sequence(frame, sequence).await?;
        Ok(sequence)
    }

    pub async fn send_with_sequence(&self, frame: &Frame, sequence: u16) -> Result<(), TelloError> {
        trace!(id = frame.raw_id(), sequence, len = frame.wire_len(), "send frame");
        self.send_raw(&frame.finalize(sequence)).await
    }

    pub async fn send_raw(&self, data: &[u8]) -> Result<(), TelloError> {
        self.socket.send_to(data, self.remote).await?;
        self.bytes_sent.fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Send the `conn_req:` literal announcing `port`.
    pub async fn send_handshake(&self, port: u16) -> Result<(), TelloError> {
        self.send_raw(&handshake_request(port)).await
    }

    /// Next datagram from the device. Datagrams from anyone else are
    /// skipped.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize, TelloError> {
        loop {
            let (len, from) = self.socket.recv_from(buf).await?;
            if from.ip() == self.remote.ip() {
                return Ok(len);
            }
            trace!(%from, "datagram from unexpected peer");
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TelloError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageId, PacketType};
    use crate::packet::Inbound;

    async fn pair() -> (ControlLink, UdpSocket) {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let link = ControlLink::bind(
            "127.0.0.1:0".parse().unwrap(),
            device.local_addr().unwrap(),
        )
        .await
        .unwrap();
        (link, device)
    }

    #[tokio::test]
    async fn sequence_advances_per_frame() {
        let (link, device) = pair().await;
        let frame = Frame::new(MessageId::TakePictureCmd, PacketType::Command);
        assert_eq!(link.send(&frame).await.unwrap(), 0);
        assert_eq!(link.send(&frame).await.unwrap(), 1);

        let mut buf = [0u8; 64];
        for expected in 0..2u16 {
            let n = device.recv(&mut buf).await.unwrap();
            match Frame::parse(&buf[..n]).unwrap() {
                Inbound::Frame(f) => assert_eq!(f.sequence(), expected),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(link.bytes_sent(), 22);
    }

    #[tokio::test]
    async fn handshake_and_reply() {
        let (link, device) = pair().await;
        link.send_handshake(9617).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = device.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"conn_req:\x96\x17");

        device.send_to(b"conn_ack:\x96\x17", from).await.unwrap();
        let n = link.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"conn_ack:\x96\x17");
    }
}
