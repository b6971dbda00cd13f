use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{LatencySample, HEADER};

/// Producer side of the latency stream. Cloned into every request handler;
/// `record` never blocks the response path.
#[derive(Clone)]
pub struct LatencyLog {
    tx: mpsc::UnboundedSender<LatencySample>,
    /// Samples refused because the writer has stopped
    dropped: Arc<AtomicU64>,
}

/// The single consumer that owns the output stream.
pub struct LogWriter {
    handle: JoinHandle<io::Result<u64>>,
}

impl LatencyLog {
    /// Starts the consumer on a blocking thread. The header line is written
    /// before any sample.
    pub fn spawn<W>(sink: W) -> (Self, LogWriter)
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::task::spawn_blocking(move || {
            write_samples(BufWriter::new(sink), rx).inspect_err(|e| {
                tracing::error!("could not write latency log, writer stopped: {e}");
            })
        });
        let log = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (log, LogWriter { handle })
    }

    pub fn record(&self, sample: LatencySample) {
        tracing::debug!(
            key = %sample.key,
            latency_ms = sample.latency.as_secs_f64() * 1000.0,
            service_time_ms = sample.service_time.as_secs_f64() * 1000.0,
            "latency sample"
        );
        if self.tx.send(sample).is_err() && self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
            tracing::warn!("latency log writer is gone, dropping samples from now on");
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl LogWriter {
    /// Waits until every `LatencyLog` handle is dropped and all queued lines
    /// are flushed. Returns the number of samples written.
    pub async fn drain(self) -> io::Result<u64> {
        self.handle.await.map_err(io::Error::other)?
    }
}

fn write_samples<W: Write>(
    mut sink: W,
    mut rx: mpsc::UnboundedReceiver<LatencySample>,
) -> io::Result<u64> {
    writeln!(sink, "{HEADER}")?;
    sink.flush()?;

    let mut written = 0;
    while let Some(sample) = rx.blocking_recv() {
        writeln!(sink, "{}", sample.format_line())?;
        written += 1;
        // Batch whatever else is already queued into one flush.
        while let Ok(sample) = rx.try_recv() {
            writeln!(sink, "{}", sample.format_line())?;
            written += 1;
        }
        sink.flush()?;
    }
    Ok(written)
}
