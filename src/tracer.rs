//! Buffered diagnostic tracer for class initialization.
//!
//! ## Environment Variables
//!
//! - `VFUNC_RS_TRACE`: Enable tracing
//!   - `"1"`, `"true"`, or `"stdout"`: Write to stdout
//!   - `"stderr"`: Write to stderr
//!   - `<path>`: Write to file at path
//!
//! - `VFUNC_RS_TRACE_LEVEL`: Minimum level to output (`"error"`, `"info"`, `"debug"`
//!   or `"trace"`, default: `"debug"`)
//!
//! - `VFUNC_RS_TRACE_FLUSH_INTERVAL`: Number of messages before auto-flush (default: 10000)
//!
//! ## Usage
//! ```ignore
//! vt_debug!(tracer, "installing {} as {}", name, method);
//! tracer.trace_install("do_thing", "DO_THING", 16, Some(16), class.as_ptr());
//! ```
use std::{
    cell::{Cell, RefCell},
    env,
    ffi::c_void,
    fs::File,
    io::{stderr, stdout, BufWriter, Write},
    rc::Rc,
};

const BUFFER_SIZE: usize = 64 * 1024;
const AUTO_FLUSH_INTERVAL: usize = 10_000; // Auto-flush every N messages

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceLevel {
    Error = 0,
    Info = 1,
    Debug = 2,
    Trace = 3,
}

impl TraceLevel {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TraceStats {
    pub total_messages: usize,
    pub slots_installed: usize,
    pub dispatches: usize,
    pub dispatch_failures: usize,
}

/// In-memory trace sink, see [`Tracer::capture`].
#[derive(Clone, Default)]
pub struct CaptureBuffer(Rc<RefCell<Vec<u8>>>);

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub struct Tracer {
    enabled: bool,
    min_level: TraceLevel,
    writer: RefCell<Option<BufWriter<Box<dyn Write>>>>,
    message_count: Cell<usize>,
    auto_flush_interval: usize,
    stats: RefCell<TraceStats>,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer {
    pub fn new() -> Self {
        let trace_env = env::var("VFUNC_RS_TRACE");
        let writer: Option<Box<dyn Write>> = match trace_env {
            Ok(val) if val == "1" || val == "true" || val == "stdout" => Some(Box::new(stdout())),
            Ok(val) if val == "stderr" => Some(Box::new(stderr())),
            Ok(val) if !val.is_empty() => {
                // assume it's a file path
                match File::create(&val) {
                    Ok(f) => Some(Box::new(f)),
                    Err(e) => {
                        eprintln!("Failed to create trace file {}: {}", val, e);
                        None
                    }
                }
            }
            _ => None,
        };

        let min_level = env::var("VFUNC_RS_TRACE_LEVEL")
            .ok()
            .and_then(|v| TraceLevel::from_str(&v))
            .unwrap_or(TraceLevel::Debug);

        let auto_flush_interval = env::var("VFUNC_RS_TRACE_FLUSH_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(AUTO_FLUSH_INTERVAL);

        Self::with_writer(
            writer.map(|w| BufWriter::with_capacity(BUFFER_SIZE, w)),
            min_level,
            auto_flush_interval,
        )
    }

    pub fn disabled() -> Self {
        Self::with_writer(None, TraceLevel::Error, AUTO_FLUSH_INTERVAL)
    }

    /// A tracer that records everything at or above `min_level` in memory, unbuffered.
    pub fn capture(min_level: TraceLevel) -> (Self, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        let sink: Box<dyn Write> = Box::new(buffer.clone());
        let tracer = Self::with_writer(
            Some(BufWriter::with_capacity(0, sink)),
            min_level,
            AUTO_FLUSH_INTERVAL,
        );
        (tracer, buffer)
    }

    fn with_writer(
        writer: Option<BufWriter<Box<dyn Write>>>,
        min_level: TraceLevel,
        auto_flush_interval: usize,
    ) -> Self {
        Self {
            enabled: writer.is_some(),
            min_level,
            writer: RefCell::new(writer),
            message_count: Cell::new(0),
            auto_flush_interval,
            stats: RefCell::new(TraceStats::default()),
        }
    }

    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline(always)]
    pub fn enabled_for(&self, level: TraceLevel) -> bool {
        self.enabled && level <= self.min_level
    }

    fn write_msg(&self, indent: usize, args: std::fmt::Arguments) {
        if let Some(ref mut writer) = *self.writer.borrow_mut() {
            for _ in 0..indent {
                let _ = writer.write_all(b"  ");
            }
            let _ = writer.write_fmt(args);
            let _ = writer.write_all(b"\n");

            let count = self.message_count.get() + 1;
            self.message_count.set(count);
            if count >= self.auto_flush_interval {
                let _ = writer.flush();
                self.message_count.set(0);
            }
        }
    }

    pub fn msg(&self, level: TraceLevel, indent: usize, args: std::fmt::Arguments) {
        if !self.enabled_for(level) {
            return;
        }
        self.stats.borrow_mut().total_messages += 1;
        self.write_msg(indent, args);
    }

    /// One line per patched slot. `reported` is what the vfunc metadata claims,
    /// which need not match the field offset actually written.
    pub fn trace_install(
        &self,
        vfunc: &str,
        method: &str,
        field_offset: usize,
        reported: Option<usize>,
        class: *const c_void,
    ) {
        self.stats.borrow_mut().slots_installed += 1;
        if !self.enabled_for(TraceLevel::Debug) {
            return;
        }
        let reported = match reported {
            Some(o) => o.to_string(),
            None => "?".to_string(),
        };
        self.msg(
            TraceLevel::Debug,
            0,
            format_args!(
                "installing vfunc {} as {} at offset {} (vs. {}) inside {:p}",
                vfunc, method, field_offset, reported, class
            ),
        );
    }

    pub fn trace_dispatch(&self, method: &str, args: &dyn std::fmt::Debug) {
        self.stats.borrow_mut().dispatches += 1;
        self.msg(
            TraceLevel::Trace,
            1,
            format_args!("-- dispatching {} with arguments {:?} --", method, args),
        );
    }

    pub fn trace_dispatch_failure(&self, method: &str, reason: &dyn std::fmt::Display) {
        self.stats.borrow_mut().dispatch_failures += 1;
        self.msg(
            TraceLevel::Error,
            1,
            format_args!("dispatch to {} failed: {}; returning zero", method, reason),
        );
    }

    pub fn stats(&self) -> TraceStats {
        self.stats.borrow().clone()
    }

    pub fn flush(&self) {
        if self.enabled {
            if let Some(ref mut writer) = *self.writer.borrow_mut() {
                let _ = writer.flush();
            }
            self.message_count.set(0);
        }
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        self.flush();
    }
}
