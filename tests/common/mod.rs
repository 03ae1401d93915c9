//! Shared helpers for the integration suites.

#![allow(dead_code)]

/// Initializes tracing for tests if not already done.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

/// Starts a named test with logging initialized.
pub fn init_test(name: &str) {
    init_test_logging();
    tracing::info!(test = name, "=== TEST START ===");
}

/// Marks a test as complete.
pub fn complete(name: &str) {
    tracing::info!(test = name, "=== TEST COMPLETE ===");
}

/// Assertion with logging for better test output.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        let __assert_with_log_cond = $cond;
        if !__assert_with_log_cond {
            tracing::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "Assertion failed"
            );
        }
        assert!(__assert_with_log_cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
