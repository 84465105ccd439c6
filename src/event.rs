use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

use crate::level::Level;
use crate::throwable::Throwable;

/// One frame of a call stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    pub class_name: String,
    pub method_name: String,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
}

impl StackFrame {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        file_name: Option<String>,
        line_number: Option<u32>,
    ) -> Self {
        StackFrame {
            class_name: class_name.into(),
            method_name: method_name.into(),
            file_name,
            line_number,
        }
    }

    /// Frame with empty class and method and no location.
    pub fn empty() -> Self {
        StackFrame::default()
    }

    /// `Class.method`, or just `method` when the class is unknown.
    pub fn qualified_method(&self) -> String {
        if self.class_name.is_empty() {
            self.method_name.clone()
        } else {
            format!("{}.{}", self.class_name, self.method_name)
        }
    }
}

/// Detaches a logging event from the live error that triggered it.
#[derive(Debug, Clone)]
pub struct ThrowableProxy {
    throwable: Arc<dyn Throwable>,
}

impl ThrowableProxy {
    pub fn new(throwable: Arc<dyn Throwable>) -> Self {
        ThrowableProxy { throwable }
    }

    pub fn throwable(&self) -> &Arc<dyn Throwable> {
        &self.throwable
    }
}

/// Key/value metadata attached to a log statement, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticContext {
    entries: Vec<(String, String)>,
}

impl DiagnosticContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. An existing key keeps its position and takes the
    /// new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|entry| entry.0 == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.0 == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn extend_from(&mut self, other: &DiagnosticContext) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compact JSON object of the entries; `"{}"` when empty.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DiagnosticContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = DiagnosticContext::new();
        for (k, v) in iter {
            ctx.insert(k, v);
        }
        ctx
    }
}

impl Serialize for DiagnosticContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A single emitted log statement, independent of the logging framework
/// that produced it.
#[derive(Debug, Clone)]
pub struct LoggingEvent {
    /// Message after argument interpolation.
    pub formatted_message: Option<String>,
    /// Message template before interpolation.
    pub message: Option<String>,
    pub level: Level,
    pub logger_name: Option<String>,
    pub thread_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub throwable_proxy: Option<ThrowableProxy>,
    /// Caller frames, innermost first.
    pub caller_data: Vec<StackFrame>,
    pub mdc: DiagnosticContext,
}

impl LoggingEvent {
    /// Event at `level` with every optional field absent.
    pub fn new(level: Level) -> Self {
        LoggingEvent {
            formatted_message: None,
            message: None,
            level,
            logger_name: None,
            thread_name: None,
            timestamp: Utc::now(),
            throwable_proxy: None,
            caller_data: Vec::new(),
            mdc: DiagnosticContext::new(),
        }
    }

    pub fn innermost_caller(&self) -> Option<&StackFrame> {
        self.caller_data.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_serializes_to_empty_object() {
        assert_eq!(DiagnosticContext::new().to_json(), "{}");
    }

    #[test]
    fn context_keeps_insertion_order() {
        let mut ctx = DiagnosticContext::new();
        ctx.insert("zeta", "1");
        ctx.insert("alpha", "2");
        ctx.insert("zeta", "3");
        assert_eq!(ctx.to_json(), r#"{"zeta":"3","alpha":"2"}"#);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn context_escapes_values() {
        let ctx: DiagnosticContext = [("path", "C:\\tmp \"x\"")].into_iter().collect();
        assert_eq!(ctx.to_json(), r#"{"path":"C:\\tmp \"x\""}"#);
    }

    #[test]
    fn qualified_method_joins_class_and_method() {
        let frame = StackFrame::new("billing::invoice", "render", None, Some(3));
        assert_eq!(frame.qualified_method(), "billing::invoice.render");
        assert_eq!(StackFrame::empty().qualified_method(), "");
    }
}
