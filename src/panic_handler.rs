use std::io::{self, Write};
use std::panic;

/// Install the panic hook: readable backtraces in debug builds, a crash
/// report pointer in release builds
pub fn initialize_panic_handler() {
    if cfg!(debug_assertions) {
        better_panic::install();
    } else {
        human_panic::setup_panic!();
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        flush_output();
        default_hook(panic_info);
        std::process::exit(1);
    }));
}

/// Flush partially written report output before the panic message
pub fn flush_output() {
    let _ = io::stdout().flush();
    let _ = writeln!(io::stderr());
}
