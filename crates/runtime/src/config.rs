// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Process-wide runtime configuration
//!
//! Three knobs: the sampling rate, the output stream, and the optional
//! collector endpoint. Read once from the environment on first use; after
//! that they change only through the setter API, which assumes a single
//! writer (typically process startup).
//!
//! The sample rate lives in an atomic so the oracle reads it without a
//! lock. The stream and collector URL live behind the emission mutex; that
//! mutex is one of the runtime's two suspension points, and readers get
//! publication through it transitively.
//!
//! Initialization is lazy behind a `OnceLock`, so a host that never calls
//! `trace2pass_init` still gets a configured runtime on its first report.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::error::{ConfigError, ConfigResult};

/// Environment variable naming the sampling rate (float, clamped to [0,1]).
pub const ENV_SAMPLE_RATE: &str = "TRACE2PASS_SAMPLE_RATE";
/// Environment variable naming the output path (opened in append mode).
pub const ENV_OUTPUT: &str = "TRACE2PASS_OUTPUT";
/// Environment variable naming the collector endpoint.
pub const ENV_COLLECTOR_URL: &str = "TRACE2PASS_COLLECTOR_URL";

/// Default sampling rate: 1%.
pub const DEFAULT_SAMPLE_RATE: f64 = 0.01;

/// Characters that disqualify a collector URL outright.
const FORBIDDEN_URL_CHARS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '<', '>', '"', '\'', '\\',
];

static INIT: OnceLock<()> = OnceLock::new();
static SAMPLE_RATE_BITS: AtomicU64 = AtomicU64::new(0);
static SINK: OnceLock<Mutex<Sink>> = OnceLock::new();

/// Where human-readable reports go.
pub(crate) enum OutputStream {
    Stderr,
    File(File),
}

impl OutputStream {
    pub(crate) fn write_all_and_flush(&mut self, text: &str) -> io::Result<()> {
        match self {
            OutputStream::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(text.as_bytes())?;
                err.flush()
            }
            OutputStream::File(file) => {
                file.write_all(text.as_bytes())?;
                file.flush()
            }
        }
    }
}

/// Mutex-guarded emission state: the stream and the collector endpoint.
pub(crate) struct Sink {
    pub stream: OutputStream,
    pub collector_url: Option<String>,
}

/// Ensure the runtime is configured; idempotent and cheap after the first
/// call.
pub(crate) fn ensure_init() {
    INIT.get_or_init(|| {
        store_sample_rate(DEFAULT_SAMPLE_RATE);
        let mut sink = Sink {
            stream: OutputStream::Stderr,
            collector_url: None,
        };

        if let Ok(value) = std::env::var(ENV_SAMPLE_RATE) {
            match value.parse::<f64>() {
                Ok(rate) if rate.is_finite() => store_sample_rate(rate.clamp(0.0, 1.0)),
                _ => warn(&ConfigError::BadSampleRate { value }),
            }
        }

        if let Ok(path) = std::env::var(ENV_OUTPUT) {
            match open_append(&path) {
                Ok(file) => sink.stream = OutputStream::File(file),
                Err(e) => warn(&e),
            }
        }

        if let Ok(url) = std::env::var(ENV_COLLECTOR_URL) {
            match validate_collector_url(&url) {
                Ok(()) => sink.collector_url = Some(url),
                Err(e) => warn(&e),
            }
        }

        // Read the rate directly: calling sample_rate() here would re-enter
        // the OnceLock.
        let banner = format!(
            "Trace2Pass: Runtime initialized (sample_rate={:.3})\n",
            f64::from_bits(SAMPLE_RATE_BITS.load(Ordering::Relaxed))
        );
        let _ = sink.stream.write_all_and_flush(&banner);

        // Only this closure ever sets SINK.
        let _ = SINK.set(Mutex::new(sink));
    });
}

/// Explicit initialization; the exported `trace2pass_init` lands here.
pub fn initialize() {
    ensure_init();
}

/// Shutdown: write the final line and drop a non-default stream.
pub fn finalize() {
    ensure_init();
    let mut sink = lock_sink();
    let _ = sink
        .stream
        .write_all_and_flush("Trace2Pass: Runtime shutting down\n");
    if matches!(sink.stream, OutputStream::File(_)) {
        sink.stream = OutputStream::Stderr;
    }
}

pub(crate) fn lock_sink() -> MutexGuard<'static, Sink> {
    ensure_init();
    let sink = SINK.get().expect("sink initialized by ensure_init");
    match sink.lock() {
        Ok(guard) => guard,
        // A panic while holding the emission lock leaves the state intact;
        // keep reporting rather than poisoning every later probe.
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn store_sample_rate(rate: f64) {
    SAMPLE_RATE_BITS.store(rate.to_bits(), Ordering::Relaxed);
}

/// Current sampling rate; lock-free.
pub fn sample_rate() -> f64 {
    ensure_init();
    f64::from_bits(SAMPLE_RATE_BITS.load(Ordering::Relaxed))
}

/// Set the sampling rate. Out-of-range or non-finite values are ignored.
pub fn set_sample_rate(rate: f64) {
    ensure_init();
    if rate.is_finite() && (0.0..=1.0).contains(&rate) {
        store_sample_rate(rate);
    }
}

/// Redirect output to `path`, opened in append mode. On failure the current
/// stream is kept and a warning is printed.
pub fn set_output_file(path: &str) {
    ensure_init();
    match open_append(path) {
        Ok(file) => lock_sink().stream = OutputStream::File(file),
        Err(e) => warn(&e),
    }
}

/// Point the collector channel at `url`; an invalid URL disables the
/// channel with one warning.
pub fn set_collector_url(url: &str) {
    ensure_init();
    match validate_collector_url(url) {
        Ok(()) => lock_sink().collector_url = Some(url.to_string()),
        Err(e) => {
            warn(&e);
            lock_sink().collector_url = None;
        }
    }
}

fn open_append(path: &str) -> ConfigResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ConfigError::OutputOpen {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

/// Accept only plain `http://` / `https://` URLs free of shell
/// metacharacters and control characters.
pub fn validate_collector_url(url: &str) -> ConfigResult<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::BadUrlScheme {
            url: url.to_string(),
        });
    }
    for ch in url.chars() {
        if FORBIDDEN_URL_CHARS.contains(&ch) || ch.is_control() {
            return Err(ConfigError::ForbiddenUrlCharacter { ch });
        }
    }
    Ok(())
}

fn warn(error: &ConfigError) {
    eprintln!("Trace2Pass: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_validate_collector_url_accepts_plain_http() {
        assert!(validate_collector_url("http://localhost:8080/report").is_ok());
        assert!(validate_collector_url("https://collector.internal/api/v1").is_ok());
    }

    #[test]
    fn test_validate_collector_url_rejects_other_schemes() {
        for url in ["ftp://x", "file:///etc/passwd", "localhost:8080", ""] {
            assert!(matches!(
                validate_collector_url(url),
                Err(ConfigError::BadUrlScheme { .. })
            ));
        }
    }

    #[test]
    fn test_validate_collector_url_rejects_shell_metacharacters() {
        for bad in [
            "http://h/; rm -rf /",
            "http://h/$(id)",
            "http://h/`id`",
            "http://h/|x",
            "http://h/&x",
            "http://h/<x",
            "http://h/>x",
            "http://h/\"x",
            "http://h/'x",
            "http://h/\\x",
        ] {
            assert!(matches!(
                validate_collector_url(bad),
                Err(ConfigError::ForbiddenUrlCharacter { .. })
            ));
        }
    }

    #[test]
    fn test_validate_collector_url_rejects_control_characters() {
        assert!(matches!(
            validate_collector_url("http://h/\n"),
            Err(ConfigError::ForbiddenUrlCharacter { ch: '\n' })
        ));
    }

    #[test]
    #[serial(runtime_config)]
    fn test_set_sample_rate_bounds() {
        set_sample_rate(0.5);
        assert_eq!(sample_rate(), 0.5);

        // Out-of-range and non-finite values are ignored.
        set_sample_rate(1.5);
        assert_eq!(sample_rate(), 0.5);
        set_sample_rate(-0.1);
        assert_eq!(sample_rate(), 0.5);
        set_sample_rate(f64::NAN);
        assert_eq!(sample_rate(), 0.5);

        set_sample_rate(1.0);
        assert_eq!(sample_rate(), 1.0);
    }

    #[test]
    #[serial(runtime_config)]
    fn test_invalid_collector_url_disables_channel() {
        set_collector_url("http://localhost:9000/ok");
        assert_eq!(
            lock_sink().collector_url.as_deref(),
            Some("http://localhost:9000/ok")
        );

        set_collector_url("http://localhost:9000/;evil");
        assert_eq!(lock_sink().collector_url, None);
    }
}
