//! LogRec - the unit of work travelling through the intake queue
//!
//! A [`LogRec`] is either a data record or a flush sentinel. Consumers must
//! branch on the variant before doing anything else.

use std::backtrace::Backtrace;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::Level;

/// Structured key/value attached to a record or logger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub key: String,
    pub value: serde_json::Value,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Finalised record payload, built once by [`Record::prep`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct Payload {
    /// Logger context fields merged with call-site fields
    pub fields: Vec<Field>,
    /// Rendered stack trace, when one was captured
    pub stacktrace: Option<String>,
}

/// Data record
#[derive(Debug)]
pub struct Record {
    time: DateTime<Utc>,
    level: Level,
    msg: String,
    context: Arc<[Field]>,
    fields: Vec<Field>,
    backtrace: Option<Backtrace>,
    payload: OnceLock<Payload>,
}

impl Record {
    /// Create a record stamped with the current time
    pub fn new(level: Level, msg: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            msg: msg.into(),
            context: Arc::from(Vec::new()),
            fields: Vec::new(),
            backtrace: None,
            payload: OnceLock::new(),
        }
    }

    /// Attach the owning logger's context fields
    pub fn with_context(mut self, context: Arc<[Field]>) -> Self {
        self.context = context;
        self
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_backtrace(mut self, backtrace: Backtrace) -> Self {
        self.backtrace = Some(backtrace);
        self
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    /// Finalise the payload
    ///
    /// Runs at most once per record; later calls return the cached payload.
    /// Call-site fields replace context fields with the same key.
    pub fn prep(&self) -> &Payload {
        self.payload.get_or_init(|| {
            let mut fields: Vec<Field> = self
                .context
                .iter()
                .filter(|c| !self.fields.iter().any(|f| f.key == c.key))
                .cloned()
                .collect();
            fields.extend(self.fields.iter().cloned());

            Payload {
                fields,
                stacktrace: self.backtrace.as_ref().map(|bt| bt.to_string()),
            }
        })
    }

    /// Finalised payload (prepares it if the consumer has not yet)
    pub fn payload(&self) -> &Payload {
        self.prep()
    }

    pub fn is_prepared(&self) -> bool {
        self.payload.get().is_some()
    }
}

/// Completion signal carried by a flush sentinel
///
/// Completing or dropping the signal both release the waiter.
#[derive(Debug)]
pub struct FlushSignal {
    tx: Sender<()>,
}

impl FlushSignal {
    /// Create a signal and the receiver that observes its completion
    pub fn pair() -> (Self, Receiver<()>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (Self { tx }, rx)
    }

    pub fn complete(self) {
        let _ = self.tx.send(());
    }
}

/// Unit of work on the intake queue
#[derive(Debug)]
pub enum LogRec {
    /// Data to be fanned out to targets
    Data(Arc<Record>),
    /// Control instruction: drain everything queued ahead, then signal
    Flush(FlushSignal),
}

impl LogRec {
    pub fn data(record: Record) -> Self {
        Self::Data(Arc::new(record))
    }

    /// Create a flush sentinel and the receiver for its completion
    pub fn flush() -> (Self, Receiver<()>) {
        let (signal, rx) = FlushSignal::pair();
        (Self::Flush(signal), rx)
    }

    pub fn is_flush(&self) -> bool {
        matches!(self, Self::Flush(_))
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Data(rec) => Some(rec),
            Self::Flush(_) => None,
        }
    }

    pub fn level(&self) -> Option<Level> {
        self.record().map(Record::level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ERROR, INFO};

    #[test]
    fn test_prep_merges_context() {
        let context: Arc<[Field]> = Arc::from(vec![
            Field::new("service", "api"),
            Field::new("request_id", 7),
        ]);
        let rec = Record::new(INFO, "hello")
            .with_context(context)
            .with_fields(vec![Field::new("request_id", 9), Field::new("user", "bob")]);

        assert!(!rec.is_prepared());
        let payload = rec.prep();
        assert!(rec.is_prepared());

        let keys: Vec<&str> = payload.fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["service", "request_id", "user"]);
        assert_eq!(payload.fields[1].value, serde_json::json!(9));
        assert!(payload.stacktrace.is_none());
    }

    #[test]
    fn test_prep_runs_once() {
        let rec = Record::new(ERROR, "boom").with_backtrace(Backtrace::force_capture());
        let first = rec.prep() as *const Payload;
        let second = rec.payload() as *const Payload;
        assert_eq!(first, second);
        assert!(rec.payload().stacktrace.is_some());
    }

    #[test]
    fn test_flush_signal_complete() {
        let (rec, rx) = LogRec::flush();
        assert!(rec.is_flush());
        assert!(rec.record().is_none());

        match rec {
            LogRec::Flush(signal) => signal.complete(),
            LogRec::Data(_) => unreachable!(),
        }
        assert!(rx.recv().is_ok());
    }

    #[test]
    fn test_flush_signal_drop_releases_waiter() {
        let (rec, rx) = LogRec::flush();
        drop(rec);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_data_variant() {
        let rec = LogRec::data(Record::new(INFO, "x"));
        assert!(!rec.is_flush());
        assert_eq!(rec.level(), Some(INFO));
        assert_eq!(rec.record().map(Record::msg), Some("x"));
    }
}
