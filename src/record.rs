use serde::Serialize;

use crate::context::WebRequestDetail;
use crate::env::EnvironmentDetail;
use crate::event::StackFrame;
use crate::level::Severity;

/// Normalized log statement shipped to the error-tracking service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMessage {
    pub msg: Option<String>,
    /// Diagnostic context as a compact JSON object, in insertion order.
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ex: Option<ErrorRecord>,
    pub th: Option<String>,
    pub level: Severity,
    pub src_method: Option<String>,
    pub src_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans_id: Option<String>,
    pub epoch_ms: i64,
    pub environment_detail: EnvironmentDetail,
}

/// Normalized error report, built for error-level events and for events
/// carrying an exception.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub environment_detail: EnvironmentDetail,
    pub occurred_epoch_millis: i64,
    pub error: ErrorItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_request_detail: Option<WebRequestDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// One level of an exception chain. `inner_error` holds the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorItem {
    pub message: Option<String>,
    pub error_type: String,
    pub source_method: Option<String>,
    pub stack_trace: Vec<TraceFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<Box<ErrorItem>>,
}

impl ErrorItem {
    /// Iterate this item and its causes, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ErrorItem> {
        std::iter::successors(Some(self), |item| item.inner_error.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceFrame {
    pub code_file_name: Option<String>,
    pub line_num: Option<u32>,
    pub method: String,
}

impl From<&StackFrame> for TraceFrame {
    fn from(frame: &StackFrame) -> Self {
        TraceFrame {
            code_file_name: frame.file_name.clone(),
            line_num: frame.line_number,
            method: frame.qualified_method(),
        }
    }
}
