use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

use crate::{DecodeFailure, ListenerFault, SnapshotDecoder, SnapshotTx, TelemetrySource};

#[derive(Clone, Debug)]
pub struct UdpConfig {
    pub bind_addr: String, // e.g. "0.0.0.0:5000"
    pub recv_buffer: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self { bind_addr: "0.0.0.0:5000".into(), recv_buffer: 64 * 1024 }
    }
}

/// Datagram listener that hands every packet to a decoder and forwards the
/// snapshots it yields. Undecodable packets are dropped here.
pub struct UdpSource<D> {
    cfg: UdpConfig,
    decoder: D,
}

impl<D: SnapshotDecoder> UdpSource<D> {
    pub fn new(cfg: UdpConfig, decoder: D) -> Self {
        Self { cfg, decoder }
    }

    pub fn config(&self) -> &UdpConfig {
        &self.cfg
    }

    /// Receive loop over an already bound socket.
    pub async fn serve(&self, socket: UdpSocket, tx: SnapshotTx) -> Result<(), ListenerFault> {
        if let Ok(addr) = socket.local_addr() {
            info!(%addr, "listening for telemetry datagrams");
        }
        let mut buf = vec![0u8; self.cfg.recv_buffer];
        loop {
            let (len, peer) = socket.recv_from(&mut buf).await.map_err(ListenerFault::Receive)?;
            match self.decoder.decode(&buf[..len]) {
                Ok(snapshot) => {
                    if tx.send(snapshot).is_err() {
                        debug!("snapshot receiver closed, stopping listener");
                        return Ok(());
                    }
                }
                Err(DecodeFailure::NotTelemetry) => trace!(%peer, len, "not a telemetry packet"),
                Err(err) => debug!(%peer, len, error = %err, "skipping datagram"),
            }
        }
    }
}

#[async_trait::async_trait]
impl<D: SnapshotDecoder> TelemetrySource for UdpSource<D> {
    async fn run(&self, tx: SnapshotTx) -> Result<(), ListenerFault> {
        let socket = UdpSocket::bind(&self.cfg.bind_addr)
            .await
            .map_err(|source| ListenerFault::Bind { addr: self.cfg.bind_addr.clone(), source })?;
        self.serve(socket, tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel, TelemetrySnapshot, VehicleState};
    use std::{sync::Arc, time::Duration};

    /// "track:laptime" text packets, anything else is noise.
    struct TextDecoder;

    impl SnapshotDecoder for TextDecoder {
        fn decode(&self, raw: &[u8]) -> Result<TelemetrySnapshot, DecodeFailure> {
            let text = std::str::from_utf8(raw)
                .map_err(|e| DecodeFailure::MalformedPayload(e.to_string()))?;
            let (track, time) = text.split_once(':').ok_or(DecodeFailure::NotTelemetry)?;
            let last_lap_time = time
                .parse()
                .map_err(|_| DecodeFailure::MalformedPayload(time.to_string()))?;
            Ok(TelemetrySnapshot {
                track_name: track.to_string(),
                vehicles: vec![VehicleState { is_player: true, last_lap_time, ..Default::default() }],
            })
        }
    }

    #[tokio::test]
    async fn test_noise_is_skipped() {
        let source = Arc::new(UdpSource::new(UdpConfig::default(), TextDecoder));
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let (tx, mut rx) = channel();
        let listener = {
            let source = source.clone();
            tokio::spawn(async move { source.serve(socket, tx).await })
        };

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for packet in [&[0xffu8, 0xfe, 0x00][..], b"no separator", b"Spa:abc", b"Spa:92.345"] {
            sender.send_to(packet, addr).await.unwrap();
        }

        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.track_name, "Spa");
        assert_eq!(snapshot.player().unwrap().last_lap_time, 92.345);
        assert!(!listener.is_finished());
        listener.abort();
    }

    #[tokio::test]
    async fn test_bind_failure_is_fault() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let cfg = UdpConfig { bind_addr: taken.local_addr().unwrap().to_string(), ..Default::default() };
        let (tx, _rx) = channel();
        let err = UdpSource::new(cfg, TextDecoder).run(tx).await.unwrap_err();
        assert!(matches!(err, ListenerFault::Bind { .. }));
    }

    #[tokio::test]
    async fn test_stops_when_receiver_dropped() {
        let source = UdpSource::new(UdpConfig::default(), TextDecoder);
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let (tx, rx) = channel();
        drop(rx);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"Spa:90.0", addr).await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), source.serve(socket, tx)).await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
