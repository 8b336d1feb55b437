// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Image acquisition with retry, backoff and per-attempt timeouts.
//!
//! Freshly uploaded images are often not reachable for a few seconds, so a
//! load is driven by a small state machine:
//!
//! ```text
//! Idle -> [Backoff(0)] -> Attempting(0) -> Success
//!                                       -> Backoff(1) -> Attempting(1) -> ...
//!                                       -> Exhausted
//! ```
//!
//! Time comes from a [`Clock`] and bytes from a [`Fetcher`], so the whole
//! machine runs against a [`VirtualClock`] and scripted responses in tests.

use crate::error::CropError;
use crate::io::media::decode_image;
use crate::models::asset::{ImageAsset, PixelAccess};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// How a fetch asks for cross-origin access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Request pixel access; required for export.
    Cors,
    /// Display-only load.
    NoCors,
}

/// Why a single fetch failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("not found")]
    NotFound,
    #[error("timed out")]
    TimedOut,
    #[error("cross-origin access denied")]
    CorsBlocked,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Source of image bytes.
pub trait Fetcher {
    fn fetch(&self, url: &str, mode: FetchMode, timeout: Duration) -> Result<Vec<u8>, FetchError>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn fetch(&self, url: &str, mode: FetchMode, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(url, mode, timeout)
    }
}

/// Source of time.
pub trait Clock {
    /// Time since the Unix epoch (or a fixed origin for virtual clocks).
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Wall clock; `sleep` blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when told to; `sleep` advances it instantly.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Cell<Duration>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Reads `file://` URLs and plain paths from disk. Query strings added for
/// cache busting are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

impl Fetcher for LocalFetcher {
    fn fetch(&self, url: &str, _mode: FetchMode, _timeout: Duration) -> Result<Vec<u8>, FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(FetchError::Transport(format!(
                "no remote transport configured for {url}"
            )));
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        let path = path.split('?').next().unwrap_or(path);
        std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound,
            _ => FetchError::Transport(e.to_string()),
        })
    }
}

/// Retry and timeout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquirePolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed wait before the first two retries.
    pub propagation_delay_ms: u64,
    /// Base of the exponential backoff used from the third retry on.
    pub base_delay_ms: u64,
    /// Hard limit per attempt.
    pub attempt_timeout_ms: u64,
    /// Hard limit per attempt on the canvas path.
    pub canvas_attempt_timeout_ms: u64,
    /// Wait before the first attempt for hosts in `propagating_hosts`.
    pub initial_delay_ms: u64,
    /// Host substrings known to publish uploads asynchronously.
    pub propagating_hosts: Vec<String>,
}

impl Default for AcquirePolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            propagation_delay_ms: 5_000,
            base_delay_ms: 1_000,
            attempt_timeout_ms: 15_000,
            canvas_attempt_timeout_ms: 5_000,
            initial_delay_ms: 2_000,
            propagating_hosts: vec![
                "firebasestorage.googleapis.com".to_string(),
                "supabase.co".to_string(),
            ],
        }
    }
}

impl AcquirePolicy {
    /// Wait before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry <= 2 {
            Duration::from_millis(self.propagation_delay_ms)
        } else {
            let factor = 1u64 << (retry - 1).min(16);
            Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn canvas_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.canvas_attempt_timeout_ms)
    }

    /// Delay before the first attempt, if `url` points at a host that
    /// propagates uploads asynchronously.
    pub fn initial_delay(&self, url: &str) -> Option<Duration> {
        let host = host_of(url)?;
        self.propagating_hosts
            .iter()
            .any(|h| !h.is_empty() && host.contains(h.as_str()))
            .then(|| Duration::from_millis(self.initial_delay_ms))
            .filter(|d| !d.is_zero())
    }
}

/// State of one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireState {
    Idle,
    /// Attempt `n` in flight; 0 is the first attempt, `n > 0` is retry `n`.
    Attempting(u32),
    /// Waiting before attempt `retry`.
    Backoff { retry: u32, wait: Duration },
    Success,
    Exhausted,
}

/// Input to [`AcquireState::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireEvent {
    Start { initial_delay: Option<Duration> },
    Waited,
    Succeeded,
    Failed,
}

impl AcquireState {
    /// Pure transition function. Events that do not apply to the current
    /// state leave it unchanged.
    pub fn next(self, event: AcquireEvent, policy: &AcquirePolicy) -> AcquireState {
        match (self, event) {
            (AcquireState::Idle, AcquireEvent::Start { initial_delay }) => match initial_delay {
                Some(wait) => AcquireState::Backoff { retry: 0, wait },
                None => AcquireState::Attempting(0),
            },
            (AcquireState::Backoff { retry, .. }, AcquireEvent::Waited) => {
                AcquireState::Attempting(retry)
            }
            (AcquireState::Attempting(_), AcquireEvent::Succeeded) => AcquireState::Success,
            (AcquireState::Attempting(n), AcquireEvent::Failed) => {
                if n < policy.max_retries {
                    AcquireState::Backoff {
                        retry: n + 1,
                        wait: policy.backoff(n + 1),
                    }
                } else {
                    AcquireState::Exhausted
                }
            }
            (state, _) => state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AcquireState::Success | AcquireState::Exhausted)
    }
}

/// Progress reports for the caller's loading indicator.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireProgress {
    Attempting { attempt: u32, url: String },
    Retrying { retry: u32, wait: Duration, reason: String },
}

/// Loads images per an [`AcquirePolicy`].
pub struct ImageAcquirer<F, C> {
    fetcher: F,
    clock: C,
    policy: AcquirePolicy,
}

impl<F: Fetcher, C: Clock> ImageAcquirer<F, C> {
    pub fn new(fetcher: F, clock: C, policy: AcquirePolicy) -> Self {
        Self {
            fetcher,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &AcquirePolicy {
        &self.policy
    }

    /// Load `url`, retrying with backoff. Never fails silently: the returned
    /// asset is either `Ready` or `Failed` with a diagnostic.
    pub fn acquire(&self, url: &str, mut on_progress: impl FnMut(&AcquireProgress)) -> ImageAsset {
        let mut state = AcquireState::Idle.next(
            AcquireEvent::Start {
                initial_delay: self.policy.initial_delay(url),
            },
            &self.policy,
        );
        let mut decoded: Option<RgbaImage> = None;
        let mut last_error = FetchError::NotFound;
        let mut attempts = 0;

        while !state.is_terminal() {
            state = match state {
                AcquireState::Backoff { retry, wait } => {
                    if retry > 0 {
                        log::warn!(
                            "Load of {} failed ({}), retry {} in {:?}",
                            url,
                            last_error,
                            retry,
                            wait
                        );
                        on_progress(&AcquireProgress::Retrying {
                            retry,
                            wait,
                            reason: last_error.to_string(),
                        });
                    } else {
                        log::debug!("Waiting {:?} for {} to propagate", wait, url);
                    }
                    self.clock.sleep(wait);
                    state.next(AcquireEvent::Waited, &self.policy)
                }
                AcquireState::Attempting(n) => {
                    attempts = n + 1;
                    let attempt_url = cache_busted(url, n, self.clock.now());
                    on_progress(&AcquireProgress::Attempting {
                        attempt: n,
                        url: attempt_url.clone(),
                    });
                    match self.attempt(&attempt_url, FetchMode::Cors, self.policy.attempt_timeout()) {
                        Ok(pixels) => {
                            decoded = Some(pixels);
                            state.next(AcquireEvent::Succeeded, &self.policy)
                        }
                        Err(e) => {
                            last_error = e;
                            state.next(AcquireEvent::Failed, &self.policy)
                        }
                    }
                }
                AcquireState::Idle | AcquireState::Success | AcquireState::Exhausted => break,
            };
        }

        let retries = attempts.saturating_sub(1);
        match decoded {
            Some(pixels) => {
                log::info!(
                    "Loaded {} ({}x{}) after {} retries",
                    url,
                    pixels.width(),
                    pixels.height(),
                    retries
                );
                ImageAsset::ready(url, pixels, PixelAccess::Readable).with_retries(retries)
            }
            None => {
                let error = terminal_error(url, attempts, &last_error);
                log::error!("{}", error);
                ImageAsset::failed(url, error).with_retries(retries)
            }
        }
    }

    /// Faster path used by the canvas: one short attempt with cross-origin
    /// access, then one without. A display-only load yields a tainted asset.
    pub fn acquire_for_canvas(&self, url: &str) -> ImageAsset {
        let timeout = self.policy.canvas_attempt_timeout();
        let cors_error = match self.attempt(url, FetchMode::Cors, timeout) {
            Ok(pixels) => return ImageAsset::ready(url, pixels, PixelAccess::Readable),
            Err(e) => e,
        };
        log::warn!("CORS load of {} failed ({}), retrying without", url, cors_error);

        match self.attempt(url, FetchMode::NoCors, timeout) {
            Ok(pixels) => ImageAsset::ready(url, pixels, PixelAccess::Tainted).with_retries(1),
            Err(e) => {
                let error = if cors_error == FetchError::TimedOut && e == FetchError::TimedOut {
                    CropError::AcquisitionTimeout {
                        url: url.to_string(),
                        attempts: 2,
                    }
                } else {
                    terminal_error(url, 2, &e)
                };
                log::error!("{}", error);
                ImageAsset::failed(url, error).with_retries(1)
            }
        }
    }

    /// One fetch + decode. A response arriving after the deadline counts as
    /// a timeout.
    fn attempt(&self, url: &str, mode: FetchMode, timeout: Duration) -> Result<RgbaImage, FetchError> {
        let started = self.clock.now();
        let bytes = self.fetcher.fetch(url, mode, timeout)?;
        if self.clock.now().saturating_sub(started) > timeout {
            return Err(FetchError::TimedOut);
        }
        decode_image(&bytes).map_err(|e| FetchError::Transport(e.to_string()))
    }
}

fn terminal_error(url: &str, attempts: u32, last_error: &FetchError) -> CropError {
    match last_error {
        FetchError::TimedOut => CropError::AcquisitionTimeout {
            url: url.to_string(),
            attempts,
        },
        other => CropError::AcquisitionExhausted {
            url: url.to_string(),
            attempts,
            reason: other.to_string(),
        },
    }
}

/// URL for attempt `attempt`: unchanged for the first, then with a timestamp
/// and retry counter so caches cannot replay an earlier failure.
pub fn cache_busted(url: &str, attempt: u32, now: Duration) -> String {
    if attempt == 0 {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}t={}&retry={attempt}", now.as_millis())
}

fn host_of(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    rest.split(['/', '?', '#']).next().filter(|h| !h.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::png_bytes;
    use crate::models::asset::LoadState;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Plays back canned responses, each taking a given amount of virtual time.
    struct ScriptedFetcher<'a> {
        clock: &'a VirtualClock,
        responses: RefCell<VecDeque<(Duration, Result<Vec<u8>, FetchError>)>>,
        requests: RefCell<Vec<(String, FetchMode)>>,
    }

    impl<'a> ScriptedFetcher<'a> {
        fn new(clock: &'a VirtualClock, responses: Vec<(Duration, Result<Vec<u8>, FetchError>)>) -> Self {
            Self {
                clock,
                responses: RefCell::new(responses.into()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetcher for ScriptedFetcher<'_> {
        fn fetch(&self, url: &str, mode: FetchMode, _timeout: Duration) -> Result<Vec<u8>, FetchError> {
            self.requests.borrow_mut().push((url.to_string(), mode));
            let (took, response) = self
                .responses
                .borrow_mut()
                .pop_front()
                .unwrap_or((Duration::ZERO, Err(FetchError::NotFound)));
            self.clock.advance(took);
            response
        }
    }

    fn no_initial_delay() -> AcquirePolicy {
        AcquirePolicy {
            propagating_hosts: Vec::new(),
            ..AcquirePolicy::default()
        }
    }

    fn quick(response: Result<Vec<u8>, FetchError>) -> (Duration, Result<Vec<u8>, FetchError>) {
        (Duration::from_millis(200), response)
    }

    #[test]
    fn test_two_misses_then_success() {
        let clock = VirtualClock::new();
        let fetcher = ScriptedFetcher::new(
            &clock,
            vec![
                quick(Err(FetchError::NotFound)),
                quick(Err(FetchError::NotFound)),
                quick(Ok(png_bytes(8, 8))),
            ],
        );
        let acquirer = ImageAcquirer::new(&fetcher, &clock, no_initial_delay());

        let mut retries_seen = Vec::new();
        let asset = acquirer.acquire("https://cdn.example/card.png", |p| {
            if let AcquireProgress::Retrying { retry, .. } = p {
                retries_seen.push(*retry);
            }
        });

        assert_eq!(asset.load_state, LoadState::Ready);
        assert_eq!(asset.retries, 2);
        assert_eq!(retries_seen, vec![1, 2]);
        assert!(clock.now() >= Duration::from_secs(10));

        let requests = fetcher.requests.borrow();
        assert_eq!(requests[0].0, "https://cdn.example/card.png");
        assert!(requests[1].0.ends_with("&retry=1"));
        assert!(requests[2].0.ends_with("&retry=2"));
        assert_ne!(requests[1].0, requests[2].0);
    }

    #[test]
    fn test_exhaustion_reports_diagnostic() {
        let clock = VirtualClock::new();
        let fetcher = ScriptedFetcher::new(&clock, Vec::new());
        let acquirer = ImageAcquirer::new(&fetcher, &clock, no_initial_delay());

        let asset = acquirer.acquire("https://cdn.example/missing.png", |_| {});
        assert_eq!(
            asset.error(),
            Some(&CropError::AcquisitionExhausted {
                url: "https://cdn.example/missing.png".to_string(),
                attempts: 6,
                reason: "not found".to_string(),
            })
        );
        assert_eq!(fetcher.requests.borrow().len(), 6);
        // 5 + 5 + 4 + 8 + 16 seconds of backoff.
        assert_eq!(clock.now(), Duration::from_secs(38));
    }

    #[test]
    fn test_slow_attempts_time_out() {
        let clock = VirtualClock::new();
        let slow = || (Duration::from_secs(16), Ok(png_bytes(4, 4)));
        let fetcher = ScriptedFetcher::new(&clock, (0..6).map(|_| slow()).collect());
        let policy = AcquirePolicy {
            max_retries: 1,
            ..no_initial_delay()
        };
        let acquirer = ImageAcquirer::new(&fetcher, &clock, policy);

        let asset = acquirer.acquire("https://cdn.example/slow.png", |_| {});
        assert!(matches!(
            asset.error(),
            Some(CropError::AcquisitionTimeout { attempts: 2, .. })
        ));
    }

    #[test]
    fn test_garbage_response_counts_as_failure() {
        let clock = VirtualClock::new();
        let fetcher = ScriptedFetcher::new(
            &clock,
            vec![quick(Ok(b"<html>".to_vec())), quick(Ok(png_bytes(2, 2)))],
        );
        let acquirer = ImageAcquirer::new(&fetcher, &clock, no_initial_delay());
        let asset = acquirer.acquire("https://cdn.example/card.png", |_| {});
        assert!(asset.is_ready());
        assert_eq!(asset.retries, 1);
    }

    #[test]
    fn test_propagating_host_waits_first() {
        let clock = VirtualClock::new();
        let fetcher = ScriptedFetcher::new(&clock, vec![(Duration::ZERO, Ok(png_bytes(2, 2)))]);
        let acquirer = ImageAcquirer::new(&fetcher, &clock, AcquirePolicy::default());

        let asset = acquirer.acquire("https://project.supabase.co/storage/v1/card.png", |_| {});
        assert!(asset.is_ready());
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = AcquirePolicy::default();
        let secs: Vec<u64> = (1..=5).map(|r| policy.backoff(r).as_secs()).collect();
        assert_eq!(secs, vec![5, 5, 4, 8, 16]);
    }

    #[test]
    fn test_state_machine_transitions() {
        let policy = AcquirePolicy {
            max_retries: 1,
            ..AcquirePolicy::default()
        };
        let start = AcquireState::Idle.next(AcquireEvent::Start { initial_delay: None }, &policy);
        assert_eq!(start, AcquireState::Attempting(0));

        let backoff = start.next(AcquireEvent::Failed, &policy);
        assert_eq!(
            backoff,
            AcquireState::Backoff {
                retry: 1,
                wait: Duration::from_secs(5)
            }
        );
        let retry = backoff.next(AcquireEvent::Waited, &policy);
        assert_eq!(retry, AcquireState::Attempting(1));
        assert_eq!(retry.next(AcquireEvent::Failed, &policy), AcquireState::Exhausted);
        assert_eq!(retry.next(AcquireEvent::Succeeded, &policy), AcquireState::Success);

        // Stray events are ignored.
        assert_eq!(
            AcquireState::Success.next(AcquireEvent::Failed, &policy),
            AcquireState::Success
        );
    }

    #[test]
    fn test_canvas_path_falls_back_to_display_only() {
        let clock = VirtualClock::new();
        let fetcher = ScriptedFetcher::new(
            &clock,
            vec![quick(Err(FetchError::CorsBlocked)), quick(Ok(png_bytes(3, 3)))],
        );
        let acquirer = ImageAcquirer::new(&fetcher, &clock, no_initial_delay());

        let asset = acquirer.acquire_for_canvas("https://other.example/card.png");
        assert!(asset.is_ready());
        assert_eq!(asset.pixel_access, PixelAccess::Tainted);
        let modes: Vec<FetchMode> = fetcher.requests.borrow().iter().map(|r| r.1).collect();
        assert_eq!(modes, vec![FetchMode::Cors, FetchMode::NoCors]);
    }

    #[test]
    fn test_canvas_path_uses_short_timeout() {
        let clock = VirtualClock::new();
        let fetcher = ScriptedFetcher::new(
            &clock,
            vec![
                (Duration::from_secs(6), Ok(png_bytes(3, 3))),
                (Duration::from_secs(6), Ok(png_bytes(3, 3))),
            ],
        );
        let acquirer = ImageAcquirer::new(&fetcher, &clock, no_initial_delay());
        let asset = acquirer.acquire_for_canvas("https://other.example/card.png");
        assert!(matches!(
            asset.error(),
            Some(CropError::AcquisitionTimeout { attempts: 2, .. })
        ));
    }

    #[test]
    fn test_cache_busted_urls() {
        let now = Duration::from_millis(1_700_000_000_123);
        assert_eq!(cache_busted("https://a/b.png", 0, now), "https://a/b.png");
        assert_eq!(
            cache_busted("https://a/b.png", 3, now),
            "https://a/b.png?t=1700000000123&retry=3"
        );
        assert_eq!(
            cache_busted("https://a/b.png?token=x", 1, now),
            "https://a/b.png?token=x&t=1700000000123&retry=1"
        );
    }

    #[test]
    fn test_local_fetcher_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        std::fs::write(&path, png_bytes(5, 6)).unwrap();

        let url = format!("file://{}?t=1&retry=1", path.display());
        let bytes = LocalFetcher
            .fetch(&url, FetchMode::Cors, Duration::from_secs(1))
            .unwrap();
        assert_eq!(decode_image(&bytes).unwrap().dimensions(), (5, 6));

        let missing = dir.path().join("nope.png");
        assert_eq!(
            LocalFetcher.fetch(&missing.display().to_string(), FetchMode::Cors, Duration::from_secs(1)),
            Err(FetchError::NotFound)
        );
        assert!(matches!(
            LocalFetcher.fetch("https://cdn.example/a.png", FetchMode::Cors, Duration::from_secs(1)),
            Err(FetchError::Transport(_))
        ));
    }
}
