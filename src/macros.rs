#[macro_export]
macro_rules! vt_msg {
    // Default to Debug level
    ($tracer:expr, $($format:tt)*) => {
        if $tracer.is_enabled() {
            $tracer.msg($crate::tracer::TraceLevel::Debug, 0, format_args!($($format)*))
        }
    }
}

#[macro_export]
macro_rules! vt_error {
    ($tracer:expr, $($format:tt)*) => {
        if $tracer.is_enabled() {
            $tracer.msg($crate::tracer::TraceLevel::Error, 0, format_args!($($format)*))
        }
    }
}

#[macro_export]
macro_rules! vt_info {
    ($tracer:expr, $($format:tt)*) => {
        if $tracer.is_enabled() {
            $tracer.msg($crate::tracer::TraceLevel::Info, 0, format_args!($($format)*))
        }
    }
}

#[macro_export]
macro_rules! vt_debug {
    ($tracer:expr, $($format:tt)*) => {
        if $tracer.is_enabled() {
            $tracer.msg($crate::tracer::TraceLevel::Debug, 0, format_args!($($format)*))
        }
    }
}

#[macro_export]
macro_rules! vt_trace {
    ($tracer:expr, $($format:tt)*) => {
        if $tracer.is_enabled() {
            $tracer.msg($crate::tracer::TraceLevel::Trace, 0, format_args!($($format)*))
        }
    }
}
