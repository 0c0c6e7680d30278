//! Sender side: handshake, window-driven transmission, Reno-governed
//! retransmission, and teardown.

use crate::error::{RdtError, Result};
use crate::packet::{Flags, HEADER_LEN, MAX_DATA_LEN, Packet};
use crate::reno::{CongestionController, CongestionState, Event};
use bytes::Bytes;
use log::{debug, info, trace, warn};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);
const ACK_WAIT: Duration = Duration::from_millis(10);
const RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Splits a file's bytes into `MAX_DATA_LEN`-sized segments, in order.
pub fn segments_from_bytes(bytes: &[u8]) -> Vec<Bytes> {
    if bytes.is_empty() {
        return Vec::new();
    }
    bytes
        .chunks(MAX_DATA_LEN)
        .map(Bytes::copy_from_slice)
        .collect()
}

struct Segment {
    data: Bytes,
    sent: bool,
    acked: bool,
    send_time: Option<Instant>,
}

/// One outgoing transfer. Constructed via [`Sender::connect`], which performs
/// the handshake; [`Sender::run`] then drives the transfer to completion.
pub struct Sender {
    socket: UdpSocket,
    peer: SocketAddr,
    segments: Vec<Segment>,
    base: usize,
    next: usize,
    congestion: CongestionController,
    max_window: u32,
    loss_rate: f64,
    delay_ms: u64,
    fast_retransmitted: bool,
}

impl Sender {
    /// Binds an ephemeral local socket, performs the three-way handshake
    /// against `peer`, and returns a `Sender` ready to run the transfer.
    pub async fn connect(
        peer: SocketAddr,
        file_segments: Vec<Bytes>,
        loss_rate: f64,
        max_window: u32,
        delay_ms: u64,
    ) -> Result<Sender> {
        let local: SocketAddr = "0.0.0.0:0".parse().unwrap();
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| RdtError::Bind { addr: local, source })?;

        let segments = file_segments
            .into_iter()
            .map(|data| Segment {
                data,
                sent: false,
                acked: false,
                send_time: None,
            })
            .collect();

        let mut sender = Sender {
            socket,
            peer,
            segments,
            base: 0,
            next: 0,
            congestion: CongestionController::new(),
            max_window,
            loss_rate,
            delay_ms,
            fast_retransmitted: false,
        };
        sender.handshake().await?;
        Ok(sender)
    }

    async fn handshake(&mut self) -> Result<()> {
        let syn = Packet::control(0, 0, Flags::SYN).encode();
        self.socket
            .send_to(&syn, self.peer)
            .await
            .map_err(RdtError::Io)?;
        info!("sent SYN to {}", self.peer);

        let mut buf = [0u8; HEADER_LEN];
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RdtError::HandshakeFailed { addr: self.peer });
            }
            let recv = timeout(remaining, self.socket.recv_from(&mut buf)).await;
            match recv {
                Ok(Ok((len, from))) if from == self.peer => {
                    let Ok(packet) = Packet::decode(&buf[..len]) else {
                        continue;
                    };
                    if packet.flags.contains(Flags::SYN) && packet.flags.contains(Flags::ACK) {
                        let ack = Packet::control(1, packet.seq + 1, Flags::ACK).encode();
                        self.socket
                            .send_to(&ack, self.peer)
                            .await
                            .map_err(RdtError::Io)?;
                        info!("handshake complete with {}", self.peer);
                        return Ok(());
                    }
                }
                Ok(Ok(_)) => {} // datagram from an unexpected peer; ignore
                Ok(Err(e)) => return Err(RdtError::Io(e)),
                Err(_) => return Err(RdtError::HandshakeFailed { addr: self.peer }),
            }
        }
    }

    /// Drives the transfer to completion: fill the window, process ACKs,
    /// watch for timeouts, then tear down.
    pub async fn run(mut self) -> Result<()> {
        while self.base < self.segments.len() {
            self.fill_window().await?;
            self.wait_for_ack().await?;
            self.check_timeout().await?;
        }
        self.teardown().await
    }

    async fn fill_window(&mut self) -> Result<()> {
        let w = self.congestion.window().min(self.max_window) as usize;
        while self.next < self.segments.len() && self.next < self.base + w {
            self.transmit(self.next).await?;
            self.next += 1;
        }
        Ok(())
    }

    async fn transmit(&mut self, idx: usize) -> Result<()> {
        let seq = (idx + 1) as u32;
        let data = self.segments[idx].data.clone();
        let encoded = Packet::data(seq, data, 0).encode();

        let dropped = self.loss_rate > 0.0 && rand::random::<f64>() < self.loss_rate;
        if dropped {
            trace!("simulated loss of seq {seq}");
        } else {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.socket
                .send_to(&encoded, self.peer)
                .await
                .map_err(RdtError::Io)?;
            trace!("sent seq {seq} ({} bytes)", encoded.len());
        }

        let segment = &mut self.segments[idx];
        segment.sent = true;
        segment.send_time = Some(Instant::now());
        Ok(())
    }

    async fn wait_for_ack(&mut self) -> Result<()> {
        let mut buf = [0u8; HEADER_LEN + MAX_DATA_LEN];
        match timeout(ACK_WAIT, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) if from == self.peer => {
                if let Ok(packet) = Packet::decode(&buf[..len]) {
                    if packet.flags.contains(Flags::ACK) {
                        self.handle_ack(packet.ack).await;
                    }
                }
                Ok(())
            }
            Ok(Ok(_)) => Ok(()), // unexpected peer
            Ok(Err(e)) => Err(RdtError::Io(e)),
            Err(_) => Ok(()), // no ACK arrived within the wait; keep looping
        }
    }

    async fn handle_ack(&mut self, s: u32) {
        if s == 0 {
            return;
        }
        let i = (s - 1) as usize;
        if i < self.base || i >= self.segments.len() {
            return;
        }

        if self.segments[i].acked {
            self.register_dup_ack().await;
            return;
        }

        self.segments[i].acked = true;
        if i == self.base {
            while self.base < self.segments.len() && self.segments[self.base].acked {
                self.base += 1;
            }
            self.fast_retransmitted = false;
            self.congestion.on_event(Event::NewDataAck);
            debug!(
                "base advanced to {} (cwnd={:.2}, state={:?})",
                self.base, self.congestion.cwnd, self.congestion.state
            );
        } else {
            self.register_dup_ack().await;
        }
    }

    async fn register_dup_ack(&mut self) {
        self.congestion.on_event(Event::DupAck);
        if self.congestion.state != CongestionState::FastRecovery
            && self.congestion.dup_ack_count == 3
            && !self.fast_retransmitted
        {
            self.congestion.on_event(Event::TripleDupAck);
            self.fast_retransmitted = true;
            info!(
                "fast retransmit seq {} (cwnd={:.2}, ssthresh={})",
                self.base + 1,
                self.congestion.cwnd,
                self.congestion.ssthresh
            );
            self.retransmit_base().await;
        }
    }

    async fn check_timeout(&mut self) -> Result<()> {
        if self.base >= self.segments.len() {
            return Ok(());
        }
        let timed_out = self.segments[self.base]
            .send_time
            .is_some_and(|t| self.segments[self.base].sent && t.elapsed() > RETRANSMIT_TIMEOUT);
        if timed_out {
            warn!("retransmission timeout on seq {}", self.base + 1);
            self.congestion.on_event(Event::Timeout);
            self.fast_retransmitted = false;
            self.retransmit_base().await;
        }
        Ok(())
    }

    async fn retransmit_base(&mut self) {
        let idx = self.base;
        if idx < self.segments.len() {
            if let Err(e) = self.transmit(idx).await {
                warn!("retransmit of seq {} failed: {e}", idx + 1);
            }
        }
    }

    async fn teardown(mut self) -> Result<()> {
        let n = self.segments.len() as u32;
        let fin = Packet::control(n + 1, 0, Flags::FIN).encode();
        self.socket
            .send_to(&fin, self.peer)
            .await
            .map_err(RdtError::Io)?;
        info!("sent FIN seq={}", n + 1);

        let mut buf = [0u8; HEADER_LEN];
        match timeout(TEARDOWN_TIMEOUT, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) if from == self.peer => {
                if let Ok(packet) = Packet::decode(&buf[..len]) {
                    if packet.flags.contains(Flags::ACK) {
                        debug!("teardown ACK received, exiting");
                    }
                }
            }
            _ => debug!("teardown ACK not received within {TEARDOWN_TIMEOUT:?}; exiting anyway"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_from_bytes_splits_on_max_data_len() {
        let file = vec![0u8; MAX_DATA_LEN * 2 + 1];
        let segments = segments_from_bytes(&file);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].len(), MAX_DATA_LEN);
        assert_eq!(segments[1].len(), MAX_DATA_LEN);
        assert_eq!(segments[2].len(), 1);
    }

    #[test]
    fn segments_from_bytes_handles_empty_file() {
        assert!(segments_from_bytes(&[]).is_empty());
    }

    /// Builds a `Sender` with `n` already-transmitted segments, bypassing the
    /// handshake, so `handle_ack` can be driven with a scripted ACK sequence.
    /// The socket is real (loopback) but nothing needs to receive on it: only
    /// `handle_ack`'s bookkeeping is under test here, not wire delivery.
    async fn scripted_sender(n: usize) -> Sender {
        let local: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = UdpSocket::bind(local).await.unwrap();
        let peer = socket.local_addr().unwrap();
        let segments = (0..n)
            .map(|_| Segment {
                data: Bytes::new(),
                sent: true,
                acked: false,
                send_time: Some(Instant::now()),
            })
            .collect();
        Sender {
            socket,
            peer,
            segments,
            base: 0,
            next: n,
            congestion: CongestionController::new(),
            max_window: 20,
            loss_rate: 0.0,
            delay_ms: 0,
            fast_retransmitted: false,
        }
    }

    /// Scenario 2 from SPEC_FULL.md §8: ten packets, seq=3 dropped on first
    /// transmission, ACKs for 1,2,4,5,6 arrive in order, then the retransmitted
    /// seq=3 is ACKed.
    #[tokio::test]
    async fn triple_dup_ack_fast_retransmits_exactly_once_then_recovers() {
        let mut sender = scripted_sender(10).await;

        sender.handle_ack(1).await;
        sender.handle_ack(2).await;
        assert_eq!(sender.base, 2);
        assert_eq!(sender.congestion.state, CongestionState::SlowStart);

        sender.handle_ack(4).await;
        sender.handle_ack(5).await;
        assert_eq!(sender.congestion.state, CongestionState::SlowStart);

        sender.handle_ack(6).await;
        assert_eq!(sender.congestion.state, CongestionState::FastRecovery);
        assert_eq!(sender.base, 2, "dup ACKs for 4,5,6 must not move the left edge");
        assert!(sender.fast_retransmitted);
        let ssthresh_after_fast_retransmit = sender.congestion.ssthresh;

        // Another ACK for an already-acked seq must not fire a second fast
        // retransmit while still in FastRecovery for the same loss event.
        sender.handle_ack(6).await;
        assert_eq!(sender.congestion.state, CongestionState::FastRecovery);

        sender.handle_ack(3).await;
        assert_eq!(sender.base, 6, "base slides past all consecutively-acked entries");
        assert_eq!(sender.congestion.state, CongestionState::CongestionAvoidance);
        assert_eq!(sender.congestion.ssthresh, ssthresh_after_fast_retransmit);
    }
}
