//! Observer hooks for the workflow lifecycle.
//!
//! Two contracts, both optional and multi-instance:
//! - `WorkflowHook`: notified of phase start/complete/error events
//! - `ApprovalHook`: adjudicates approval gates and receives
//!   notifications
//!
//! Dispatch is synchronous and ordered by registration; a failing hook
//! is logged and skipped, never allowed to disturb the pipeline.

pub mod builtin;
pub mod console;
pub mod dispatcher;
pub mod types;

pub use builtin::{CheckpointHook, LoggingHook};
pub use console::ConsoleApprovalHook;
pub use dispatcher::HookDispatcher;
pub use types::{
    ApprovalContext, ApprovalHook, ApprovalResponse, NotificationSeverity, WorkflowHook,
};
