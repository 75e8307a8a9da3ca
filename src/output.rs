//! Output backends for publications.

use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::aggregator::Publication;

/// Where each tick's publication goes.
#[derive(Debug)]
pub enum Output {
    /// Write the publication to a JSON file, overwritten every tick.
    File(PathBuf),

    /// Send newline-delimited JSON to a TCP server, best effort.
    Tcp(String),

    /// Print one JSON line per tick to stdout.
    Stdout,

    /// Hand publications to an in-process consumer.
    ///
    /// Use [`Output::channel`] to create this variant and get the receiver.
    Channel(mpsc::Sender<Publication>),
}

impl Output {
    /// ```rust
    /// use healthtree::Output;
    ///
    /// let output = Output::file("health.json");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return it with its receiver.
    ///
    /// Publications are dropped rather than awaited when the channel is full.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Publication>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Emit one publication.
    pub async fn emit(&self, publication: &Publication) -> io::Result<()> {
        match self {
            Output::File(path) => {
                let json = serde_json::to_string_pretty(publication)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Tcp(addr) => {
                let mut stream = TcpStream::connect(addr).await?;
                let mut line = serde_json::to_vec(publication)?;
                line.push(b'\n');
                stream.write_all(&line).await?;
            }
            Output::Stdout => {
                let json = serde_json::to_string(publication)?;
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{}", json)?;
                stdout.flush()?;
            }
            Output::Channel(tx) => {
                let _ = tx.try_send(publication.clone());
            }
        }
        Ok(())
    }
}
