/// Intercept messages using the `log` crate and print them to STDERR, defaulting to the `info`
/// level. `RUST_LOG` overrides the filter as usual.
pub fn setup() {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Like `setup`, but safe to call from many tests in the same process. Output is captured by the
/// test harness.
pub fn setup_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
