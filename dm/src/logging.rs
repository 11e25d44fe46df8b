//! Diagnostic tracing for the driver model.
//!
//! The crate only emits records through the `log` facade; installing a logger
//! is up to the firmware. Lifecycle tracing goes through [debug_ex], which is
//! compiled out of release builds.

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug_ex!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            $crate::__log::log!(target: $target, $crate::__log::Level::Debug, $($arg)+)
        }
    };

    // debug_ex!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            $crate::__log::log!($crate::__log::Level::Debug, $($arg)+)
        }
    };
}

/// Warning that a driver-model invariant was bent but recovered from.
#[macro_export]
macro_rules! dm_warn {
    ($($arg:tt)+) => {
        $crate::__log::warn!(target: "dm", $($arg)+)
    };
}
