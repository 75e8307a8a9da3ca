//! TCP ingestion of report batches and registrations.
//!
//! Producers connect and send newline-delimited JSON, one message per line:
//!
//! ```text
//! {"kind":"batch","timestamp_ms":1703160000000,"reports":[{"name":"motor_1","level":0,"message":"OK"}]}
//! {"kind":"register","namespace":"arm","analyzers":[{"type":"generic","path":"Joints","startswith":"arm_"}]}
//! ```
//!
//! Each registration line is answered with one `RegistrationResponse` line.
//! Registrations made over a connection live as long as that connection.

use std::io;
use std::sync::Arc;

use healthtree_types::{ReportBatch, SchemaVersion, StatusReport};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::aggregator::{Aggregator, RegistrationRequest};
use crate::session::LivenessSession;

/// Default ingestion address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7373";

/// Longest accepted line in bytes. Longer lines are discarded whole.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One inbound line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inbound {
    Batch(InboundBatch),
    Register(RegistrationRequest),
}

/// A batch as sent by a producer, with its reports not yet checked.
///
/// Reports are decoded one at a time so a malformed one does not cost the
/// rest of the batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InboundBatch {
    #[serde(default)]
    pub version: SchemaVersion,

    #[serde(default)]
    pub timestamp_ms: u64,

    #[serde(default)]
    pub reports: Vec<serde_json::Value>,
}

impl InboundBatch {
    /// Split into the well-formed reports and one error per rejected report.
    pub fn decode(self) -> (ReportBatch, Vec<serde_json::Error>) {
        let mut errors = Vec::new();
        let reports = self
            .reports
            .into_iter()
            .filter_map(|value| {
                serde_json::from_value::<StatusReport>(value)
                    .map_err(|e| errors.push(e))
                    .ok()
            })
            .collect();

        let batch = ReportBatch {
            version: self.version,
            timestamp_ms: self.timestamp_ms,
            reports,
        };
        (batch, errors)
    }
}

/// Accept connections forever, handling each on its own task.
pub async fn serve(listener: TcpListener, aggregator: Arc<Aggregator>) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "Listening for status reports");

    loop {
        let (stream, peer) = listener.accept().await?;
        let aggregator = aggregator.clone();
        tokio::spawn(async move {
            let peer = peer.to_string();
            debug!(peer = %peer, "Producer connected");
            if let Err(e) = handle_connection(stream, aggregator, &peer).await {
                warn!(peer = %peer, error = %e, "Connection failed");
            }
        });
    }
}

/// Process one producer connection until it closes.
///
/// Malformed lines, including invalid UTF-8 and lines over
/// [`MAX_LINE_BYTES`], are logged and skipped. Liveness sessions for the
/// connection's registrations end when this returns.
pub async fn handle_connection<S>(stream: S, aggregator: Arc<Aggregator>, peer: &str) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut sessions: Vec<LivenessSession> = Vec::new();

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            break;
        }
        if buf.len() > MAX_LINE_BYTES && buf.last() != Some(&b'\n') {
            warn!(peer, limit = MAX_LINE_BYTES, "Skipping oversized line");
            discard_line(&mut reader).await?;
            continue;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(peer, error = %e, "Skipping line that is not UTF-8");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Inbound>(line) {
            Ok(Inbound::Batch(inbound)) => {
                let (batch, errors) = inbound.decode();
                for e in errors {
                    aggregator.warn_once(format!("Skipping malformed status report: {}", e));
                }
                aggregator.ingest(&batch);
            }
            Ok(Inbound::Register(request)) => {
                let (session, watch) = LivenessSession::new(request.namespace.clone());
                let response = aggregator.register(request, watch);
                if response.success {
                    sessions.push(session);
                }

                let mut reply = serde_json::to_vec(&response)?;
                reply.push(b'\n');
                writer.write_all(&reply).await?;
                writer.flush().await?;
            }
            Err(e) => warn!(peer, error = %e, "Skipping malformed line"),
        }
    }

    debug!(peer, registrations = sessions.len(), "Producer disconnected");
    Ok(())
}

/// Consume input up to and including the next newline, or to end of stream.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<()> {
    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(used);
        if done {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::RegistrationResponse;
    use crate::config::AggregatorConfig;
    use healthtree_types::Level;
    use std::time::Duration;
    use tokio::io::Lines;

    const REGISTER_ARM: &str = r#"{"kind":"register","namespace":"arm","analyzers":[{"type":"generic","path":"Joints","startswith":"arm_"}]}"#;
    const BATCH: &str = r#"{"kind":"batch","timestamp_ms":1,"reports":[{"name":"arm_1","level":1,"message":"Slow"},{"name":"fan","level":0,"message":"OK"}]}"#;
    // Always rejected; its reply marks that every earlier line was handled.
    const BARRIER: &str = r#"{"kind":"register","namespace":"","analyzers":[]}"#;

    fn aggregator() -> Arc<Aggregator> {
        Arc::new(Aggregator::new(AggregatorConfig::default()).unwrap())
    }

    async fn reply<R: AsyncRead + Unpin>(lines: &mut Lines<BufReader<R>>) -> RegistrationResponse {
        let line = lines.next_line().await.unwrap().expect("reply line");
        serde_json::from_str(&line).unwrap()
    }

    async fn send<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) {
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..100 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn inbound_lines_parse() {
        assert!(matches!(
            serde_json::from_str::<Inbound>(BATCH).unwrap(),
            Inbound::Batch(b) if b.reports.len() == 2
        ));
        assert!(matches!(
            serde_json::from_str::<Inbound>(REGISTER_ARM).unwrap(),
            Inbound::Register(r) if r.namespace == "arm"
        ));
        assert!(serde_json::from_str::<Inbound>(r#"{"kind":"hello"}"#).is_err());
    }

    #[tokio::test]
    async fn registration_lives_as_long_as_connection() {
        let aggregator = aggregator();
        let (client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn({
            let aggregator = aggregator.clone();
            async move { handle_connection(server, aggregator, "test").await }
        });

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        send(&mut write_half, REGISTER_ARM).await;
        assert!(reply(&mut lines).await.success);

        send(&mut write_half, "not json").await;
        send(&mut write_half, BATCH).await;
        send(&mut write_half, BARRIER).await;
        assert!(!reply(&mut lines).await.success);

        let publication = aggregator.publish_tick();
        assert_eq!(
            publication.batch.get("/arm/Joints/arm_1").map(|n| n.level),
            Some(Level::Warn)
        );
        assert!(publication.batch.get("/Other/fan").is_some());

        drop(write_half);
        drop(lines);
        task.await.unwrap().unwrap();
        wait_until(|| aggregator.registrations().is_empty()).await;
        assert!(aggregator.publish_tick().batch.get("/arm").is_none());
    }

    #[test]
    fn bad_reports_are_rejected_one_at_a_time() {
        let line = r#"{"kind":"batch","timestamp_ms":1,"reports":[
            {"name":"fan","level":0},
            {"name":"pump","level":300},
            {"level":1,"message":"who am I"},
            "junk"
        ]}"#;
        let Inbound::Batch(inbound) = serde_json::from_str::<Inbound>(line).unwrap() else {
            panic!("expected a batch");
        };

        let (batch, errors) = inbound.decode();
        let levels: Vec<_> = batch.iter().map(|r| (r.name.as_str(), r.level)).collect();
        assert_eq!(levels, [("fan", Level::Ok), ("pump", Level::Error)]);
        assert_eq!(batch.timestamp_ms, 1);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "missing field `name`");
    }

    #[tokio::test]
    async fn malformed_report_does_not_drop_its_batch() {
        let aggregator = aggregator();
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(handle_connection(server, aggregator.clone(), "test"));

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        let mixed = r#"{"kind":"batch","timestamp_ms":1,"reports":[{"name":"fan","level":0},{"name":"pump","level":300},{"level":0}]}"#;
        send(&mut write_half, mixed).await;
        send(&mut write_half, mixed).await;
        send(&mut write_half, BARRIER).await;
        reply(&mut lines).await;

        let publication = aggregator.publish_tick();
        assert_eq!(publication.batch.get("/Other/fan").map(|n| n.level), Some(Level::Ok));
        assert_eq!(publication.batch.get("/Other/pump").map(|n| n.level), Some(Level::Error));
        assert_eq!(
            aggregator.warnings(),
            ["Skipping malformed status report: missing field `name`"]
        );
    }

    #[tokio::test]
    async fn undecodable_lines_keep_the_connection() {
        let aggregator = aggregator();
        let (client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn(handle_connection(server, aggregator.clone(), "test"));

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        send(&mut write_half, REGISTER_ARM).await;
        assert!(reply(&mut lines).await.success);

        write_half.write_all(b"\xff\xfe garbage\n").await.unwrap();
        let oversized = vec![b'x'; MAX_LINE_BYTES + 10];
        write_half.write_all(&oversized).await.unwrap();
        write_half.write_all(b"\n").await.unwrap();
        send(&mut write_half, BATCH).await;
        send(&mut write_half, BARRIER).await;
        assert!(!reply(&mut lines).await.success);

        assert!(!task.is_finished());
        assert_eq!(aggregator.registrations(), ["arm"]);
        assert_eq!(
            aggregator.publish_tick().batch.get("/arm/Joints/arm_1").map(|n| n.level),
            Some(Level::Warn)
        );
    }

    #[tokio::test]
    async fn discard_line_stops_after_newline() {
        let mut reader = BufReader::with_capacity(4, &b"abcdefgh\nrest"[..]);
        discard_line(&mut reader).await.unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "rest");
    }

    #[tokio::test]
    async fn duplicate_registration_gets_failure_reply() {
        let aggregator = aggregator();
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(handle_connection(server, aggregator.clone(), "test"));

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        send(&mut write_half, REGISTER_ARM).await;
        assert!(reply(&mut lines).await.success);
        send(&mut write_half, REGISTER_ARM).await;
        let response = reply(&mut lines).await;
        assert!(!response.success);
        assert_eq!(response.message, "Namespace already registered: arm");
        assert_eq!(aggregator.registrations(), ["arm"]);
    }

    #[tokio::test]
    async fn ingests_batches_from_the_sdk_updater() {
        use healthtree_sdk::{FrequencyParams, FrequencyStatus, Heartbeat, Output, Updater};

        let aggregator = aggregator();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, aggregator.clone()));

        let updater = Updater::builder()
            .name_prefix("camera")
            .output(Output::tcp(addr.to_string()))
            .build();
        updater.add(Heartbeat::new());
        updater.add(FrequencyStatus::new("Frame rate", FrequencyParams::exactly(30.0)));
        updater.emit_now().await;

        wait_until(|| aggregator.publish_tick().batch.get("/Other/camera: Frame rate").is_some()).await;
        let publication = aggregator.publish_tick();
        let heartbeat = publication.batch.get("/Other/camera: Heartbeat").unwrap();
        assert_eq!(heartbeat.message, "Alive");
        assert_eq!(publication.toplevel.level, Level::Error);
    }

    #[tokio::test]
    async fn serves_tcp_producers() {
        let aggregator = aggregator();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, aggregator.clone()));

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        send(&mut write_half, BATCH).await;
        send(&mut write_half, BARRIER).await;
        reply(&mut lines).await;

        assert_eq!(aggregator.publish_tick().toplevel.level, Level::Warn);
    }
}
