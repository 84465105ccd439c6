use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::event::StackFrame;

/// An exception as reported by the host application: a type name, a
/// message, the frames it was raised through and an optional cause.
pub trait Throwable: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    fn message(&self) -> Option<&str>;

    /// Frames innermost first. Empty when the platform captured none.
    fn stack_trace(&self) -> &[StackFrame];

    fn cause(&self) -> Option<&dyn Throwable>;
}

/// Longest cause chain captured; anything deeper is cut off.
pub const MAX_CAUSE_DEPTH: usize = 64;

/// Walk a throwable and its causes, outermost first.
///
/// Stops at the first throwable already visited so a cause chain that
/// loops back on itself still terminates. Identity is the full trait
/// object pointer: a cause stored inline at offset zero shares its
/// parent's address but not its vtable.
pub fn cause_chain(throwable: &dyn Throwable) -> Vec<&dyn Throwable> {
    let mut chain: Vec<&dyn Throwable> = Vec::new();
    let mut current = Some(throwable);

    while let Some(t) = current {
        if chain.len() >= MAX_CAUSE_DEPTH || chain.iter().any(|seen| std::ptr::eq(*seen, t)) {
            break;
        }
        chain.push(t);
        current = t.cause();
    }

    chain
}

/// Owned [`Throwable`] implementation.
#[derive(Debug, Clone, Default)]
pub struct Exception {
    pub type_name: String,
    pub message: Option<String>,
    pub stack_trace: Vec<StackFrame>,
    pub cause: Option<Arc<dyn Throwable>>,
}

impl Exception {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Exception {
            type_name: type_name.into(),
            message: Some(message.into()),
            stack_trace: Vec::new(),
            cause: None,
        }
    }

    pub fn with_stack_trace(mut self, frames: Vec<StackFrame>) -> Self {
        self.stack_trace = frames;
        self
    }

    pub fn with_cause(mut self, cause: Arc<dyn Throwable>) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Capture a standard error together with its `source()` chain.
    ///
    /// Rust errors carry neither a runtime type name nor frames, so the
    /// type is read from the head of the `Debug` output and the frame list
    /// stays empty. For a derived enum that head is the variant name
    /// (`AppError::Io(..)` reports `Io`). `std::io::Error` is recognized
    /// by downcast and reported as `std::io::Error`.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut current = Some(err);
        while let Some(e) = current {
            // A hand-written `source` may loop back.
            if chain.len() >= MAX_CAUSE_DEPTH
                || chain.iter().any(|c: &&(dyn Error + 'static)| std::ptr::eq(*c, e))
            {
                break;
            }
            chain.push(e);
            current = e.source();
        }

        let (outer, inner) = (chain[0], &chain[1..]);
        let cause = inner.iter().rev().fold(None, |cause, e| {
            Some(Arc::new(Exception {
                type_name: debug_type_name(*e),
                message: Some(e.to_string()),
                stack_trace: Vec::new(),
                cause,
            }) as Arc<dyn Throwable>)
        });

        Exception {
            type_name: debug_type_name(outer),
            message: Some(outer.to_string()),
            stack_trace: Vec::new(),
            cause,
        }
    }
}

fn debug_type_name(err: &(dyn Error + 'static)) -> String {
    if err.downcast_ref::<std::io::Error>().is_some() {
        return "std::io::Error".to_string();
    }
    let debug = format!("{:?}", err);
    let head: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    let head = head.rsplit("::").next().unwrap_or_default();
    if head.is_empty() || !head.starts_with(|c: char| c.is_ascii_uppercase()) {
        "Error".to_string()
    } else {
        head.to_string()
    }
}

impl Throwable for Exception {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn stack_trace(&self) -> &[StackFrame] {
        &self.stack_trace
    }

    fn cause(&self) -> Option<&dyn Throwable> {
        self.cause.as_deref()
    }
}
