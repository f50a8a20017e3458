//! Progress-callback trait for per-request chat events.
//!
//! Inject an [`Arc<dyn ChatProgressCallback>`] via
//! [`crate::config::ChatConfigBuilder::progress_callback`] to learn when a
//! provider call starts, when a reply arrives, and when a call fell back to
//! its placeholder. The CLI uses it to drive a spinner; a web front end
//! could forward the same events over a socket.
//!
//! # Example
//!
//! ```rust
//! use docchat::{ChatConfig, ChatProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     replies: AtomicUsize,
//! }
//!
//! impl ChatProgressCallback for CountingCallback {
//!     fn on_reply(&self, provider: &str, chars: usize, elapsed_ms: u64) {
//!         self.replies.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{provider}: {chars} chars in {elapsed_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { replies: AtomicUsize::new(0) });
//!
//! let config = ChatConfig::builder()
//!     .progress_callback(counter as Arc<dyn ChatProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::session::Notice;
use std::sync::Arc;

/// Called by the session as it processes each submission.
///
/// All methods have default no-op implementations so callers only
/// override what they care about.
pub trait ChatProgressCallback: Send + Sync {
    /// Called just before the provider request is sent.
    ///
    /// # Arguments
    /// * `provider` — display label of the provider, e.g. `OpenAI (gpt-4o)`
    fn on_request_start(&self, provider: &str) {
        let _ = provider;
    }

    /// Called when the provider produced a usable reply.
    ///
    /// # Arguments
    /// * `provider`   — display label of the provider
    /// * `chars`      — character count of the cleaned reply
    /// * `elapsed_ms` — wall-clock duration of the call
    fn on_reply(&self, provider: &str, chars: usize, elapsed_ms: u64) {
        let _ = (provider, chars, elapsed_ms);
    }

    /// Called when the reply was replaced by the provider's placeholder.
    ///
    /// # Arguments
    /// * `provider` — display label of the provider
    /// * `notice`   — the notice that was queued on the session
    fn on_fallback(&self, provider: &str, notice: &Notice) {
        let _ = (provider, notice);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ChatProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ChatConfig`].
pub type ProgressCallback = Arc<dyn ChatProgressCallback>;
