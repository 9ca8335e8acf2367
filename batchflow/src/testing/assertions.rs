//! Test assertions for request contexts.

use crate::process::{ProcessExecutionContext, ProcessStatus};

/// Asserts that the context has the expected status.
pub fn assert_process_status(ctx: &ProcessExecutionContext, expected: ProcessStatus) {
    assert_eq!(
        ctx.status(),
        expected,
        "Expected status {expected}, got {} (error: {:?})",
        ctx.status(),
        ctx.error_message()
    );
}

/// Asserts that volume was generated for the context.
pub fn assert_volume_generated(ctx: &ProcessExecutionContext) {
    assert!(
        !ctx.is_errored(),
        "Expected no error, got {:?}",
        ctx.error_message()
    );
    assert_process_status(ctx, ProcessStatus::VolumeGenerated);
}

/// Asserts that the context was marked as errored with a message containing `needle`.
pub fn assert_process_errored(ctx: &ProcessExecutionContext, needle: &str) {
    let message = ctx.error_message();
    assert!(
        message.as_deref().is_some_and(|m| m.contains(needle)),
        "Expected error containing '{needle}', got {message:?}"
    );
    assert_process_status(ctx, ProcessStatus::Error);
}

/// Asserts that the context was left untouched.
pub fn assert_process_untouched(ctx: &ProcessExecutionContext) {
    assert!(!ctx.is_errored(), "Expected no error, got {:?}", ctx.error_message());
    assert_process_status(ctx, ProcessStatus::New);
}
