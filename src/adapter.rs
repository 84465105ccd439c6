use std::sync::Arc;

use crate::context::RequestContext;
use crate::env::EnvironmentDetail;
use crate::event::{LoggingEvent, StackFrame};
use crate::level::{Level, Severity};
use crate::record::{ErrorItem, ErrorRecord, LogMessage, TraceFrame};
use crate::throwable::{cause_chain, Throwable};

/// Error type reported for error-level events that carry no exception.
pub const STRING_EXCEPTION: &str = "StringException";

/// Maps [`LoggingEvent`]s into [`LogMessage`]s and [`ErrorRecord`]s.
///
/// Holds nothing but the environment it stamps on each record, so one
/// adapter can be shared across threads. Per-request values come in
/// through the [`RequestContext`] argument.
#[derive(Debug, Clone)]
pub struct EventAdapter {
    env: EnvironmentDetail,
}

impl EventAdapter {
    pub fn new(env: EnvironmentDetail) -> Self {
        EventAdapter { env }
    }

    pub fn environment(&self) -> &EnvironmentDetail {
        &self.env
    }

    /// The exception behind the event's throwable proxy, if any.
    pub fn extract_throwable(&self, event: &LoggingEvent) -> Option<Arc<dyn Throwable>> {
        event
            .throwable_proxy
            .as_ref()
            .map(|proxy| Arc::clone(proxy.throwable()))
    }

    pub fn is_error_level(&self, event: &LoggingEvent) -> bool {
        event.level >= Level::Error
    }

    /// Class of the innermost caller frame, or `""` without caller data.
    pub fn class_name_of<'a>(&self, event: &'a LoggingEvent) -> &'a str {
        event
            .innermost_caller()
            .map(|frame| frame.class_name.as_str())
            .unwrap_or("")
    }

    /// Turn one event into the log message the service ingests.
    ///
    /// An [`ErrorRecord`] is attached when the event is at error level or
    /// carries an exception.
    pub fn adapt(&self, event: &LoggingEvent, ctx: &RequestContext) -> LogMessage {
        let throwable = self.extract_throwable(event);
        let error = if throwable.is_some() || self.is_error_level(event) {
            Some(self.build_error_record(event, throwable.as_deref(), ctx))
        } else {
            None
        };
        self.build_log_message(event, error, ctx)
    }

    pub fn build_log_message(
        &self,
        event: &LoggingEvent,
        error: Option<ErrorRecord>,
        ctx: &RequestContext,
    ) -> LogMessage {
        let caller = event.innermost_caller();

        LogMessage {
            msg: event.formatted_message.clone(),
            data: event.mdc.to_json(),
            ex: error,
            th: event.thread_name.clone(),
            level: Severity::from(event.level),
            src_method: caller.map(|frame| format!("{}.{}", frame.class_name, frame.method_name)),
            src_line: caller.and_then(|frame| frame.line_number),
            trans_id: ctx.transaction_id().map(str::to_string),
            epoch_ms: event.timestamp.timestamp_millis(),
            environment_detail: self.env.clone(),
        }
    }

    /// Build the error report for `event`.
    ///
    /// **Parameters**
    /// - `throwable`: the exception to report. When absent a
    ///   [`STRING_EXCEPTION`] is synthesized from the formatted message
    ///   and the innermost caller frame.
    /// - `ctx`: supplies the user name and web request detail.
    pub fn build_error_record(
        &self,
        event: &LoggingEvent,
        throwable: Option<&dyn Throwable>,
        ctx: &RequestContext,
    ) -> ErrorRecord {
        let mut error = match throwable {
            Some(throwable) => self.error_item_from(throwable),
            None => self.string_exception(event),
        };
        if error.source_method.is_none() {
            error.source_method = event.innermost_caller().map(StackFrame::qualified_method);
        }

        ErrorRecord {
            environment_detail: self.env.clone(),
            occurred_epoch_millis: event.timestamp.timestamp_millis(),
            error,
            web_request_detail: ctx.web_request().cloned(),
            user_name: ctx.user().map(str::to_string),
        }
    }

    fn error_item_from(&self, throwable: &dyn Throwable) -> ErrorItem {
        let chain = cause_chain(throwable);
        if chain.len() > 1 {
            tracing::trace!(depth = chain.len(), "capturing exception cause chain");
        }

        let mut item: Option<ErrorItem> = None;
        for t in chain.into_iter().rev() {
            let frames = t.stack_trace();
            item = Some(ErrorItem {
                message: t.message().map(str::to_string),
                error_type: t.type_name().to_string(),
                source_method: frames.first().map(StackFrame::qualified_method),
                stack_trace: frames.iter().map(TraceFrame::from).collect(),
                inner_error: item.map(Box::new),
            });
        }

        // `cause_chain` always yields at least `throwable` itself.
        item.unwrap_or_else(|| ErrorItem {
            message: throwable.message().map(str::to_string),
            error_type: throwable.type_name().to_string(),
            source_method: None,
            stack_trace: Vec::new(),
            inner_error: None,
        })
    }

    fn string_exception(&self, event: &LoggingEvent) -> ErrorItem {
        let frame = match event.innermost_caller() {
            Some(caller) => StackFrame::new(
                self.class_name_of(event),
                caller.method_name.clone(),
                Some(String::new()),
                caller.line_number,
            ),
            None => StackFrame::empty(),
        };

        ErrorItem {
            message: event.formatted_message.clone(),
            error_type: STRING_EXCEPTION.to_string(),
            source_method: event.innermost_caller().map(|_| frame.qualified_method()),
            stack_trace: vec![TraceFrame::from(&frame)],
            inner_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WebRequestDetail;
    use crate::event::ThrowableProxy;
    use crate::throwable::Exception;

    fn adapter() -> EventAdapter {
        EventAdapter::new(EnvironmentDetail::new("billing", "test", "ci-runner"))
    }

    fn event_with_caller(level: Level) -> LoggingEvent {
        let mut event = LoggingEvent::new(level);
        event.formatted_message = Some("Exception message".to_string());
        event.caller_data = vec![StackFrame::new("class", "method", Some("file".into()), Some(123))];
        event
    }

    #[derive(Debug)]
    struct SelfCaused;

    impl Throwable for SelfCaused {
        fn type_name(&self) -> &str {
            "SelfCaused"
        }

        fn message(&self) -> Option<&str> {
            Some("again")
        }

        fn stack_trace(&self) -> &[StackFrame] {
            &[]
        }

        fn cause(&self) -> Option<&dyn Throwable> {
            Some(self)
        }
    }

    #[test]
    fn extract_throwable_without_proxy_is_none() {
        let event = LoggingEvent::new(Level::Info);
        assert!(adapter().extract_throwable(&event).is_none());
    }

    #[test]
    fn extract_throwable_returns_wrapped_instance() {
        let throwable: Arc<dyn Throwable> = Arc::new(Exception::new("NullPointer", "boom"));
        let mut event = LoggingEvent::new(Level::Error);
        event.throwable_proxy = Some(ThrowableProxy::new(Arc::clone(&throwable)));

        let extracted = adapter().extract_throwable(&event).expect("throwable");
        assert!(Arc::ptr_eq(&extracted, &throwable));
    }

    #[test]
    fn builds_log_message_from_event() {
        let mut event = LoggingEvent::new(Level::Debug);
        event.formatted_message = Some("msg".to_string());
        event.thread_name = Some("th".to_string());
        event.caller_data = vec![StackFrame::new("srcClass", "srcMethod", Some(String::new()), Some(14))];
        event.mdc.insert("key", "value");

        let msg = adapter().build_log_message(&event, None, &RequestContext::new());

        assert_eq!(msg.msg.as_deref(), Some("msg"));
        assert_eq!(msg.data, r#"{"key":"value"}"#);
        assert!(msg.ex.is_none());
        assert_eq!(msg.th.as_deref(), Some("th"));
        assert_eq!(msg.level.as_str(), "debug");
        assert_eq!(msg.src_method.as_deref(), Some("srcClass.srcMethod"));
        assert_eq!(msg.src_line, Some(14));
        assert_eq!(msg.epoch_ms, event.timestamp.timestamp_millis());
        assert_eq!(msg.environment_detail.application_name, "billing");
    }

    #[test]
    fn log_message_carries_supplied_error() {
        let a = adapter();
        let event = event_with_caller(Level::Error);
        let error = a.build_error_record(&event, None, &RequestContext::new());
        let msg = a.build_log_message(&event, Some(error), &RequestContext::new());
        assert_eq!(msg.ex.expect("error").error.error_type, STRING_EXCEPTION);
    }

    #[test]
    fn bare_event_degrades_to_absent_fields() {
        let event = LoggingEvent::new(Level::Trace);
        let msg = adapter().build_log_message(&event, None, &RequestContext::new());

        assert!(msg.msg.is_none());
        assert_eq!(msg.data, "{}");
        assert!(msg.th.is_none());
        assert_eq!(msg.level, Severity::Debug);
        assert!(msg.src_method.is_none());
        assert!(msg.src_line.is_none());
        assert!(msg.trans_id.is_none());
    }

    #[test]
    fn error_level_threshold() {
        let a = adapter();
        assert!(!a.is_error_level(&LoggingEvent::new(Level::Debug)));
        assert!(!a.is_error_level(&LoggingEvent::new(Level::Warn)));
        assert!(a.is_error_level(&LoggingEvent::new(Level::Error)));
    }

    #[test]
    fn synthesizes_string_exception_without_throwable() {
        let event = event_with_caller(Level::Error);
        let record = adapter().build_error_record(&event, None, &RequestContext::new());

        assert_eq!(record.error.error_type, "StringException");
        assert_eq!(record.error.message.as_deref(), Some("Exception message"));
        assert_eq!(
            record.error.stack_trace,
            vec![TraceFrame {
                code_file_name: Some(String::new()),
                line_num: Some(123),
                method: "class.method".to_string(),
            }]
        );
        assert_eq!(record.error.source_method.as_deref(), Some("class.method"));
    }

    #[test]
    fn string_exception_without_caller_data_has_empty_frame() {
        let mut event = LoggingEvent::new(Level::Error);
        event.formatted_message = Some("lost".to_string());
        let record = adapter().build_error_record(&event, None, &RequestContext::new());

        assert_eq!(record.error.stack_trace.len(), 1);
        let frame = &record.error.stack_trace[0];
        assert_eq!(frame.method, "");
        assert!(frame.line_num.is_none());
        assert!(record.error.source_method.is_none());
    }

    #[test]
    fn captures_real_exception_and_causes() {
        let root = Exception::new("IoError", "connection reset")
            .with_stack_trace(vec![StackFrame::new("net::tcp", "read", Some("tcp.rs".into()), Some(88))]);
        let top = Exception::new("FetchError", "fetch failed")
            .with_stack_trace(vec![StackFrame::new("client", "fetch", Some("client.rs".into()), Some(12))])
            .with_cause(Arc::new(root));

        let event = event_with_caller(Level::Warn);
        let record = adapter().build_error_record(&event, Some(&top), &RequestContext::new());

        assert_eq!(record.error.error_type, "FetchError");
        assert_eq!(record.error.message.as_deref(), Some("fetch failed"));
        assert_eq!(record.error.source_method.as_deref(), Some("client.fetch"));
        let inner = record.error.inner_error.as_deref().expect("cause");
        assert_eq!(inner.error_type, "IoError");
        assert_eq!(inner.stack_trace[0].method, "net::tcp.read");
        assert_eq!(inner.stack_trace[0].line_num, Some(88));
        assert!(inner.inner_error.is_none());
    }

    #[test]
    fn exception_without_frames_uses_caller_as_source() {
        let event = event_with_caller(Level::Error);
        let err = Exception::new("Timeout", "gave up");
        let record = adapter().build_error_record(&event, Some(&err), &RequestContext::new());
        assert_eq!(record.error.source_method.as_deref(), Some("class.method"));
        assert!(record.error.stack_trace.is_empty());
    }

    #[test]
    fn cyclic_cause_chain_terminates() {
        let event = event_with_caller(Level::Error);
        let record = adapter().build_error_record(&event, Some(&SelfCaused), &RequestContext::new());
        assert!(record.error.chain().count() <= 2);
        assert!(record.error.chain().all(|item| item.error_type == "SelfCaused"));
    }

    #[test]
    fn wrapped_error_cause_becomes_inner_error() {
        #[derive(Debug)]
        enum StoreError {
            Io(std::io::Error),
        }

        impl std::fmt::Display for StoreError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "could not persist order")
            }
        }

        impl std::error::Error for StoreError {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                match self {
                    StoreError::Io(e) => Some(e),
                }
            }
        }

        let err = StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let exception = Exception::from_error(&err);
        let event = event_with_caller(Level::Error);
        let record = adapter().build_error_record(&event, Some(&exception), &RequestContext::new());

        let inner = record.error.inner_error.as_deref().expect("cause");
        assert_eq!(inner.error_type, "std::io::Error");
        assert_eq!(inner.message.as_deref(), Some("disk gone"));
    }

    #[test]
    fn transaction_id_follows_request_context() {
        let a = adapter();
        let event = LoggingEvent::new(Level::Debug);

        let mut ctx = RequestContext::new();
        ctx.put_transaction_id("0b9c5a52-6a1b-4d0e-9f54-2f0d4c7d1e33");
        let msg = a.build_log_message(&event, None, &ctx);
        assert_eq!(msg.trans_id.as_deref(), Some("0b9c5a52-6a1b-4d0e-9f54-2f0d4c7d1e33"));

        ctx.clear();
        assert!(a.build_log_message(&event, None, &ctx).trans_id.is_none());
    }

    #[test]
    fn user_and_web_request_follow_request_context() {
        let a = adapter();
        let mut event = LoggingEvent::new(Level::Error);
        event.message = Some("Exception message".to_string());
        let err = Exception::new("Failure", "bad");

        let mut ctx = RequestContext::new();
        ctx.put_user("user");
        ctx.put_web_request(WebRequestDetail::default());
        let record = a.build_error_record(&event, Some(&err), &ctx);
        assert_eq!(record.user_name.as_deref(), Some("user"));
        assert!(record.web_request_detail.is_some());

        let record = a.build_error_record(&event, Some(&err), &RequestContext::new());
        assert!(record.user_name.is_none());
        assert!(record.web_request_detail.is_none());
    }

    #[test]
    fn class_name_of_innermost_caller() {
        let a = adapter();
        let event = event_with_caller(Level::Info);
        assert_eq!(a.class_name_of(&event), "class");
        assert_eq!(a.class_name_of(&LoggingEvent::new(Level::Info)), "");
    }

    #[test]
    fn adapt_attaches_error_only_when_warranted() {
        let a = adapter();
        let ctx = RequestContext::new();

        let info = event_with_caller(Level::Info);
        assert!(a.adapt(&info, &ctx).ex.is_none());

        let error = event_with_caller(Level::Error);
        let msg = a.adapt(&error, &ctx);
        assert_eq!(msg.level, Severity::Error);
        assert_eq!(msg.ex.expect("error").error.error_type, STRING_EXCEPTION);

        let mut warn = event_with_caller(Level::Warn);
        warn.throwable_proxy = Some(ThrowableProxy::new(Arc::new(Exception::new("Retryable", "later"))));
        let msg = a.adapt(&warn, &ctx);
        assert_eq!(msg.ex.expect("error").error.error_type, "Retryable");
    }

    #[test]
    fn log_message_serializes_with_wire_names() {
        let mut event = event_with_caller(Level::Warn);
        event.thread_name = Some("worker-1".to_string());
        let mut ctx = RequestContext::new();
        ctx.put_transaction_id("tx");

        let json = serde_json::to_value(adapter().adapt(&event, &ctx)).unwrap();
        assert_eq!(json["level"], "warn");
        assert_eq!(json["th"], "worker-1");
        assert_eq!(json["srcMethod"], "class.method");
        assert_eq!(json["srcLine"], 123);
        assert_eq!(json["transId"], "tx");
        assert_eq!(json["data"], "{}");
        assert!(json.get("ex").is_none());
    }
}
