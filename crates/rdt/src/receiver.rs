//! Receiver side: handshake responder, checksum validation, out-of-order
//! buffering, flow control, and FIN-driven teardown.

use crate::error::{RdtError, Result};
use crate::packet::{Flags, HEADER_LEN, MAX_DATA_LEN, Packet};
use bytes::Bytes;
use log::{debug, info, trace, warn};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;

/// One inbound connection. Binds `listen_addr`, then [`Receiver::run`] drives
/// the handshake, data phase, and teardown to completion.
pub struct Receiver {
    socket: UdpSocket,
    sink: File,
    rcv_window: u32,
    expected: u32,
    buffer: BTreeMap<u32, Bytes>,
    connected: bool,
    peer: Option<SocketAddr>,
}

impl Receiver {
    pub async fn bind(listen_addr: SocketAddr, sink: File, rcv_window: u32) -> Result<Receiver> {
        let socket = UdpSocket::bind(listen_addr)
            .await
            .map_err(|source| RdtError::Bind { addr: listen_addr, source })?;
        info!("listening on {listen_addr}");
        Ok(Receiver {
            socket,
            sink,
            rcv_window,
            expected: 1,
            buffer: BTreeMap::new(),
            connected: false,
            peer: None,
        })
    }

    /// Receives and handles datagrams until a FIN completes the connection.
    pub async fn run(mut self) -> Result<()> {
        let mut buf = [0u8; HEADER_LEN + MAX_DATA_LEN];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await.map_err(RdtError::Io)?;
            let packet = match Packet::decode(&buf[..len]) {
                Ok(packet) => packet,
                Err(e) => {
                    trace!("dropped packet from {from}: {e}");
                    continue;
                }
            };

            if self.handle_packet(packet, from).await? {
                break;
            }
        }
        self.sink.flush().await.map_err(RdtError::Io)?;
        Ok(())
    }

    /// Returns `true` once the connection should terminate (FIN handled).
    async fn handle_packet(&mut self, packet: Packet, from: SocketAddr) -> Result<bool> {
        if let Some(peer) = self.peer {
            if from != peer {
                trace!("ignoring datagram from {from}: connection already established with {peer}");
                return Ok(false);
            }
        }

        if packet.flags.contains(Flags::SYN) {
            self.peer = Some(from);
            let reply = Packet::control(0, packet.seq + 1, Flags::SYN | Flags::ACK).encode();
            self.socket.send_to(&reply, from).await.map_err(RdtError::Io)?;
            debug!("replied SYN|ACK to {from}, remembering as connection's one client");
            return Ok(false);
        }

        if packet.flags.contains(Flags::FIN) {
            let ack = Packet::control(0, packet.seq + 1, Flags::ACK).encode();
            self.socket.send_to(&ack, from).await.map_err(RdtError::Io)?;
            info!("received FIN from {from}, tearing down");
            return Ok(true);
        }

        let is_pure_ack = packet.flags.contains(Flags::ACK)
            && !packet.flags.contains(Flags::SYN)
            && packet.data.is_empty();

        if is_pure_ack && !self.connected {
            self.connected = true;
            self.peer = Some(from);
            info!("connection established with {from}");
            return Ok(false);
        }

        if self.connected && !packet.data.is_empty() {
            self.handle_data(packet, from).await?;
        }

        Ok(false)
    }

    async fn handle_data(&mut self, packet: Packet, from: SocketAddr) -> Result<()> {
        let s = packet.seq;
        if s >= self.expected + self.rcv_window {
            trace!("dropped seq {s}: outside receive window (expected={})", self.expected);
            return Ok(());
        }

        let ack = Packet::control(0, s, Flags::ACK).encode();
        self.socket.send_to(&ack, from).await.map_err(RdtError::Io)?;

        if s == self.expected {
            self.deliver(packet.data).await?;
            self.expected += 1;
            while let Some(buffered) = self.buffer.remove(&self.expected) {
                self.deliver(buffered).await?;
                self.expected += 1;
            }
        } else if s > self.expected {
            self.buffer.entry(s).or_insert(packet.data);
        } else {
            trace!("duplicate seq {s} re-acked (expected={})", self.expected);
        }

        Ok(())
    }

    async fn deliver(&mut self, data: Bytes) -> Result<()> {
        self.sink.write_all(&data).await.map_err(RdtError::Io)?;
        Ok(())
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                "receiver dropped with {} buffered out-of-order segment(s) undelivered",
                self.buffer.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    /// Mirrors the receiver's in-order delivery / buffering decision without
    /// any socket or file involved, for the out-of-order and flow-control
    /// scenarios in §8.
    struct ReorderModel {
        expected: u32,
        rcv_window: u32,
        buffer: Map<u32, ()>,
        delivered: Vec<u32>,
        acks: Vec<u32>,
    }

    impl ReorderModel {
        fn new(expected: u32, rcv_window: u32) -> Self {
            ReorderModel {
                expected,
                rcv_window,
                buffer: Map::new(),
                delivered: Vec::new(),
                acks: Vec::new(),
            }
        }

        fn arrive(&mut self, s: u32) {
            if s >= self.expected + self.rcv_window {
                return;
            }
            self.acks.push(s);
            if s == self.expected {
                self.delivered.push(s);
                self.expected += 1;
                while self.buffer.remove(&self.expected).is_some() {
                    self.delivered.push(self.expected);
                    self.expected += 1;
                }
            } else if s > self.expected {
                self.buffer.entry(s).or_insert(());
            }
        }
    }

    #[test]
    fn out_of_order_burst_delivers_in_order_and_acks_every_arrival() {
        let mut model = ReorderModel::new(1, 5);
        for s in [2, 1, 4, 3, 5] {
            model.arrive(s);
        }
        assert_eq!(model.delivered, vec![1, 2, 3, 4, 5]);
        assert_eq!(model.acks, vec![2, 1, 4, 3, 5]);
        assert_eq!(model.expected, 6);
    }

    #[test]
    fn flow_control_drops_segment_outside_receive_window() {
        let mut model = ReorderModel::new(1, 3);
        model.arrive(5);
        assert!(model.delivered.is_empty());
        assert!(model.acks.is_empty());
    }

    #[test]
    fn duplicate_below_expected_is_re_acked_but_not_redelivered() {
        let mut model = ReorderModel::new(1, 5);
        model.arrive(1);
        model.arrive(1);
        assert_eq!(model.delivered, vec![1]);
        assert_eq!(model.acks, vec![1, 1]);
    }
}
