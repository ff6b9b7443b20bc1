use crate::models::CanonicalRecord;
use crate::utils::GateError;
use std::io::Write;

/// Receives records that passed the persistence gate. Durable storage is
/// the implementor's business.
pub trait RecordSink: Send {
    fn publish(&mut self, record: &CanonicalRecord) -> Result<(), GateError>;

    fn flush(&mut self) -> Result<(), GateError> {
        Ok(())
    }
}

/// Writes each eligible record through the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl RecordSink for LogSink {
    fn publish(&mut self, record: &CanonicalRecord) -> Result<(), GateError> {
        log::info!(
            "{} {} | confidence {:.3} | seen {}x since source {}",
            record.domain,
            record.display_text,
            record.best_confidence,
            record.observation_count,
            record.first_seen
        );
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn publish(&mut self, record: &CanonicalRecord) -> Result<(), GateError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), GateError> {
        self.writer.flush()?;
        Ok(())
    }
}
