use tracing_subscriber::EnvFilter;

use crate::utils::CRATE_NAMES;

#[doc(hidden)]
pub fn __init_test(module_path: &'static str) {
    let crate_name = module_path.split("::").next().unwrap_or(module_path);

    let mut filter = EnvFilter::new("off");
    for name in CRATE_NAMES.iter().chain([&crate_name]) {
        if let Ok(directive) = format!("{name}=trace").parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Initialize the logger for testing.
///
/// This logs to the stdout registered by the Rust test runner, and captures logs from the calling
/// crate and the pipeline crates.
///
/// # Example
///
/// ```
/// rum_log::init_test!();
/// ```
#[macro_export]
macro_rules! init_test {
    () => {
        $crate::__init_test(::std::module_path!());
    };
}
