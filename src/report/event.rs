//! Report events and sinks
//!
//! The reporter never formats text itself. It emits [`ReportEvent`]s into a
//! [`ReportSink`]; sinks decide whether to buffer them (HTTP) or print them
//! as they arrive (CLI).

use super::render::Format;
use crate::registry::RecordInstance;

#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    /// Opening line naming the resolved cutoff
    Cutoff { cutoff: String },
    /// A record type has instances edited after the cutoff
    TypeHeader { type_name: String, cutoff: String },
    Instance(RecordInstance),
    /// Closes a type group
    Separator,
    /// An unmapped table has rows edited after the cutoff
    TableHeader {
        table: String,
        count: usize,
        cutoff: String,
    },
    /// `id` is `None` when the row has no ID column
    TableRow {
        id: Option<String>,
        last_edited: String,
    },
    UntimedHeader,
    UntimedTable { table: String },
}

pub trait ReportSink {
    fn emit(&mut self, event: ReportEvent);
}

impl ReportSink for Vec<ReportEvent> {
    fn emit(&mut self, event: ReportEvent) {
        self.push(event);
    }
}

/// Prints every event to stdout as soon as it is emitted
pub struct PrintSink {
    format: Format,
}

impl PrintSink {
    pub fn new(format: Format) -> Self {
        Self { format }
    }
}

impl ReportSink for PrintSink {
    fn emit(&mut self, event: ReportEvent) {
        println!("{}", self.format.render(&event));
    }
}
