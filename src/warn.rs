//! Printing compiler diagnostics to stderr.

use std::sync::atomic::{AtomicBool, Ordering};

/// Warnings are only printed while this is true; the `redlinec`
/// binary switches it on with `--verbose`.
pub static DO_WARN: AtomicBool = AtomicBool::new(false);

pub fn set_warnings(on: bool) {
    DO_WARN.store(on, Ordering::SeqCst);
}

pub fn warnings_enabled() -> bool {
    DO_WARN.load(Ordering::SeqCst)
}

#[macro_export]
macro_rules! warn {
    ($formatstr:expr $(,$arg:expr)*) => { {
        if $crate::warn::warnings_enabled() {
            use std::io::Write;
            let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
            let _ = write!(&mut outp, "W: ");
            let _ = write!(&mut outp, $formatstr $(,$arg)*);
            let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
            let _ = outp.flush();
        }
    } }
}

#[macro_export]
macro_rules! nowarn {
    ($formatstr:expr $(,$arg:expr)*) => {
    }
}
