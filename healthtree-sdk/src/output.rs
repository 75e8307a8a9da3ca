//! Output backends for report batches.

use std::path::PathBuf;

use healthtree_types::ReportBatch;
use serde::Serialize;

/// One line of the aggregator's ingestion protocol.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Batch(&'a ReportBatch),
}

/// Where an [`Updater`](crate::Updater) sends its batches.
#[derive(Debug)]
pub enum Output {
    /// Write the latest batch to a JSON file, overwritten every update.
    File(PathBuf),

    /// Send each batch as one `{"kind":"batch",...}` line to an aggregator.
    Tcp(String),

    /// Send batches through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    #[cfg(feature = "tokio")]
    Channel(tokio::sync::mpsc::Sender<ReportBatch>),
}

impl Output {
    /// Create a file output.
    ///
    /// ```rust
    /// use healthtree_sdk::Output;
    ///
    /// let output = Output::file("status.json");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output pointing at an aggregator's listen address.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return both the output and receiver.
    #[cfg(feature = "tokio")]
    pub fn channel(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<ReportBatch>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Encode a batch as an ingestion line, newline included.
    pub fn encode_line(batch: &ReportBatch) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(&Line::Batch(batch))?;
        line.push(b'\n');
        Ok(line)
    }

    /// Emit a batch to this output.
    #[cfg(feature = "tokio")]
    pub(crate) async fn emit(&self, batch: &ReportBatch) -> std::io::Result<()> {
        match self {
            Output::File(path) => {
                let json = serde_json::to_string_pretty(batch)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Tcp(addr) => {
                use tokio::io::AsyncWriteExt;
                use tokio::net::TcpStream;

                let mut stream = TcpStream::connect(addr).await?;
                stream.write_all(&Self::encode_line(batch)?).await?;
                stream.shutdown().await?;
            }
            Output::Channel(tx) => {
                // Best effort send (don't block if channel is full)
                let _ = tx.try_send(batch.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthtree_types::Level;

    fn batch() -> ReportBatch {
        ReportBatch::builder()
            .timestamp_ms(42)
            .report("Heartbeat", Level::Ok, "Alive")
            .build()
    }

    #[test]
    fn line_is_tagged_as_batch() {
        let line = Output::encode_line(&batch()).unwrap();
        assert_eq!(line.last(), Some(&b'\n'));

        let value: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(value["kind"], "batch");
        assert_eq!(value["timestamp_ms"], 42);
        assert_eq!(value["reports"][0]["name"], "Heartbeat");
        assert_eq!(value["reports"][0]["level"], 0);
    }

    #[tokio::test]
    async fn file_output_holds_latest_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        let output = Output::file(&path);

        output.emit(&batch()).await.unwrap();
        let written: ReportBatch =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, batch());
    }

    #[tokio::test]
    async fn tcp_output_sends_one_line() {
        use tokio::io::AsyncBufReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let output = Output::tcp(listener.local_addr().unwrap().to_string());

        let batch = batch();
        let (accepted, emitted) = tokio::join!(listener.accept(), output.emit(&batch));
        emitted.unwrap();
        let (stream, _) = accepted.unwrap();

        let mut lines = tokio::io::BufReader::new(stream).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert!(line.starts_with(r#"{"kind":"batch""#));
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn channel_output_forwards() {
        let (output, mut rx) = Output::channel(1);
        output.emit(&batch()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), batch());
    }
}
