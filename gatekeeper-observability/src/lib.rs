pub mod sink;

pub use sink::{build_sink, AuditSink, HttpAuditSink, NullAuditSink};
