use crate::adapter::EventAdapter;
use crate::context::RequestContext;
use crate::event::{DiagnosticContext, LoggingEvent, StackFrame, ThrowableProxy};
use crate::level::Level;
use crate::record::LogMessage;
use crate::sink::LogSink;
use crate::throwable::Exception;
use chrono::Utc;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events from this crate are never forwarded, so sink failures reported
/// through `tracing` cannot loop back into the sink.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Method name used for caller frames of events outside any span.
pub const UNKNOWN_METHOD: &str = "?";

/// `tracing_subscriber` layer that runs every event through an
/// [`EventAdapter`] and forwards the resulting [`LogMessage`] to a
/// [`LogSink`] via a bounded channel and background task.
///
/// Span fields supply the request context and diagnostic context:
/// `trans_id`/`transaction_id`, `user`/`user_name` and the `http.*` fields
/// fill the [`RequestContext`], everything else lands in the diagnostic
/// context. The sink is never awaited on the application thread.
pub struct ErrorTrackingLayer {
    adapter: EventAdapter,
    sender: mpsc::Sender<LogMessage>,
    min_level: tracing::Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl ErrorTrackingLayer {
    /// Create a new layer and spawn a background task that pulls
    /// [`LogMessage`]s from a bounded channel and hands them to `sink`.
    ///
    /// **Parameters**
    /// - `sink`: transport for adapted messages.
    /// - `adapter`: carries the environment stamped on every record.
    /// - `buffer`: channel capacity, at least 16. Events arriving while
    ///   the channel is full are dropped and counted.
    /// - `min_level`: events less severe than this are ignored.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        sink: Arc<dyn LogSink>,
        adapter: EventAdapter,
        buffer: usize,
        min_level: Level,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let (tx, mut rx) = mpsc::channel::<LogMessage>(buffer);

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = sink.send(&message).await {
                    tracing::warn!(error = %e, "log sink rejected message");
                }
            }
            if let Err(e) = sink.flush().await {
                tracing::warn!(error = %e, "log sink flush failed");
            }
        });

        (
            Self {
                adapter,
                sender: tx,
                min_level: min_level.into(),
                total_events: Arc::new(AtomicU64::new(0)),
                enqueued_events: Arc::new(AtomicU64::new(0)),
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            handle,
        )
    }
}

/// Request and diagnostic context recorded from a span's fields, kept in
/// the span's extensions.
#[derive(Debug, Clone, Default)]
pub struct SpanFields {
    pub request: RequestContext,
    pub mdc: DiagnosticContext,
}

impl SpanFields {
    fn put(&mut self, name: &str, value: String) {
        match name {
            "trans_id" | "transaction_id" => self.request.put_transaction_id(value),
            "user" | "user_name" => self.request.put_user(value),
            "http.method" => self.request.web_request_mut().http_method = Some(value),
            "http.url" => self.request.web_request_mut().request_url = Some(value),
            "http.client_ip" => self.request.web_request_mut().user_ip_address = Some(value),
            "http.referer" => self.request.web_request_mut().referral_url = Some(value),
            "http.protocol" => self.request.web_request_mut().request_protocol = Some(value),
            "http.query" => {
                let query = &mut self.request.web_request_mut().query_string;
                for pair in value.split('&').filter(|p| !p.is_empty()) {
                    let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                    query.insert(k.to_string(), v.to_string());
                }
            }
            _ => self.mdc.insert(name, value),
        }
    }
}

impl<S> Layer<S> for ErrorTrackingLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = SpanFields::default();
        attrs.record(&mut FieldVisitor::span(&mut fields));
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            values.record(&mut FieldVisitor::span(fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if *meta.level() > self.min_level || meta.target().starts_with(OWN_TARGET) {
            return;
        }

        // Root to leaf, so inner spans override outer ones.
        let mut fields = SpanFields::default();
        let mut method = UNKNOWN_METHOD;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(span_fields) = span.extensions().get::<SpanFields>() {
                    fields.request.merge(&span_fields.request);
                    fields.mdc.extend_from(&span_fields.mdc);
                }
                method = span.name();
            }
        }

        let mut message = None;
        let mut error = None;
        event.record(&mut FieldVisitor {
            fields: &mut fields,
            message: Some(&mut message),
            error: Some(&mut error),
        });

        let caller = StackFrame::new(
            meta.module_path().unwrap_or(meta.target()),
            method,
            meta.file().map(str::to_string),
            meta.line(),
        );
        let thread = std::thread::current();
        let thread_name = thread
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:?}", thread.id()));

        let logging_event = LoggingEvent {
            formatted_message: message.clone(),
            message,
            level: Level::from(*meta.level()),
            logger_name: Some(meta.target().to_string()),
            thread_name: Some(thread_name),
            timestamp: Utc::now(),
            throwable_proxy: error.map(|e| ThrowableProxy::new(Arc::new(e))),
            caller_data: vec![caller],
            mdc: fields.mdc,
        };

        let record = self.adapter.adapt(&logging_event, &fields.request);
        match self.sender.try_send(record) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

use tracing::field::{Field, Visit};

/// Collects span or event fields. The `message` and `error` slots are
/// only present for events; for spans those fields go into the
/// diagnostic context like any other.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut SpanFields,
    pub message: Option<&'a mut Option<String>>,
    pub error: Option<&'a mut Option<Exception>>,
}

impl<'a> FieldVisitor<'a> {
    pub fn span(fields: &'a mut SpanFields) -> Self {
        FieldVisitor { fields, message: None, error: None }
    }

    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            if let Some(slot) = self.message.as_deref_mut() {
                *slot = Some(value);
                return;
            }
        }
        self.fields.put(field.name(), value);
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        match self.error.as_deref_mut() {
            Some(slot) => *slot = Some(Exception::from_error(value)),
            None => self.put(field, value.to_string()),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}
