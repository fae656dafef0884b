//! Categorised logging for the emulator core.
//!
//! Every subsystem logs through [`log`] with a [`LogCategory`] and a
//! [`LogLevel`]. Whether a message is emitted is decided by the process-wide
//! [`LogConfig`] before the message closure is evaluated, so disabled logging
//! costs one atomic load. Admitted messages are forwarded to the `log` crate
//! facade with the target `gb::<category>`, which lets the host pick any
//! logger implementation (`env_logger` in tests).
//!
//! # Architecture
//!
//! - **LogConfig**: global levels stored in atomics, one per category plus a
//!   global fallback
//! - **RateLimiter**: sliding one-second window per category so a hot loop
//!   (e.g. a game hammering an unmapped register) cannot flood the output
//!
//! # Usage
//!
//! ```rust
//! use gb_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Cpu, LogLevel::Warn, || {
//!     format!("illegal opcode 0xD3 at PC={:04X}", 0x1234)
//! });
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

const CATEGORY_COUNT: usize = 7;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }

    fn as_log_level(self) -> Option<log::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(log::Level::Error),
            LogLevel::Warn => Some(log::Level::Warn),
            LogLevel::Info => Some(log::Level::Info),
            LogLevel::Debug => Some(log::Level::Debug),
            LogLevel::Trace => Some(log::Level::Trace),
        }
    }
}

/// Log category for the emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Instruction execution
    Cpu,
    /// Memory map decode, unmapped accesses
    Bus,
    /// LCD controller and renderer
    Ppu,
    /// Sound channels and mixer
    Apu,
    /// Interrupt requests and dispatch
    Interrupts,
    /// Cartridge header and mapper
    Cartridge,
    /// Unimplemented hardware features
    Stubs,
}

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Cpu,
        LogCategory::Bus,
        LogCategory::Ppu,
        LogCategory::Apu,
        LogCategory::Interrupts,
        LogCategory::Cartridge,
        LogCategory::Stubs,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Cpu => 0,
            LogCategory::Bus => 1,
            LogCategory::Ppu => 2,
            LogCategory::Apu => 3,
            LogCategory::Interrupts => 4,
            LogCategory::Cartridge => 5,
            LogCategory::Stubs => 6,
        }
    }

    /// `log` crate target used for this category
    pub fn target(self) -> &'static str {
        match self {
            LogCategory::Cpu => "gb::cpu",
            LogCategory::Bus => "gb::bus",
            LogCategory::Ppu => "gb::ppu",
            LogCategory::Apu => "gb::apu",
            LogCategory::Interrupts => "gb::interrupts",
            LogCategory::Cartridge => "gb::cartridge",
            LogCategory::Stubs => "gb::stubs",
        }
    }
}

#[derive(Default)]
struct Window {
    timestamps: VecDeque<Instant>,
    dropped: usize,
    last_drop_report: Option<Instant>,
}

/// Sliding-window limiter, one window per category.
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    windows: Mutex<[Window; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            windows: Mutex::new(Default::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, [Window; CATEGORY_COUNT]> {
        // A panic while holding the lock leaves the windows usable.
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns (allowed, dropped_count) where dropped_count is Some(n) when
    /// a summary of dropped messages is due.
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let mut windows = self.lock();
        let window = &mut windows[category.index()];

        while let Some(&front) = window.timestamps.front() {
            if now.duration_since(front) > self.window_duration {
                window.timestamps.pop_front();
            } else {
                break;
            }
        }

        let max_logs = self.max_logs_per_second.load(Ordering::Relaxed);
        if max_logs == usize::MAX {
            return (true, None);
        }
        if window.timestamps.len() < max_logs {
            window.timestamps.push_back(now);
            if window.dropped > 0 {
                let dropped = std::mem::take(&mut window.dropped);
                window.last_drop_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        window.dropped += 1;
        let report_due = match window.last_drop_report {
            None => true,
            Some(last) => now.duration_since(last) >= self.window_duration,
        };
        if report_due {
            let dropped = std::mem::take(&mut window.dropped);
            window.last_drop_report = Some(now);
            (false, Some(dropped))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; CATEGORY_COUNT],
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All logging disabled, 60 messages per second per category.
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: Default::default(),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    /// Set the level used by categories without their own level
    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category level other than Off wins; otherwise the global level applies.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum logs per second per category. `usize::MAX` turns
    /// limiting off.
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_logs_per_second
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_logs_per_second.load(Ordering::Relaxed)
    }
}

/// Log a message with the specified category and level.
///
/// The closure only runs when the category admits `level` and the rate
/// limiter has room. When messages were dropped, a one-line summary is
/// emitted at Warn before the next admitted message.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }
    let Some(log_level) = level.as_log_level() else {
        return;
    };

    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        log::log!(
            target: category.target(),
            log::Level::Warn,
            "rate limit exceeded, {} message(s) dropped in the last second",
            count
        );
    }
    if allowed {
        log::log!(target: category.target(), log_level, "{}", message_fn());
    }
}
