pub mod level;
pub mod event;
pub mod throwable;
pub mod context;
pub mod env;
pub mod record;
pub mod adapter;
pub mod sink;
pub mod layer;

pub mod init;
pub mod noop_sink;

pub use adapter::{EventAdapter, STRING_EXCEPTION};
pub use context::{RequestContext, WebRequestDetail};
pub use env::EnvironmentDetail;
pub use event::{DiagnosticContext, LoggingEvent, StackFrame, ThrowableProxy};
pub use layer::ErrorTrackingLayer;
pub use level::{Level, Severity};
pub use record::{ErrorItem, ErrorRecord, LogMessage, TraceFrame};
pub use sink::LogSink;
pub use throwable::{Exception, Throwable};
