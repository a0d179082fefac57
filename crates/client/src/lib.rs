//! Resilient transcript fetch client.
//!
//! One logical "fetch content for identifier" call against the
//! transcript service, with failure classification, bounded retry on
//! rate limiting, and deduplication of concurrent calls for the same
//! identifier. Descriptive metadata (channel + title) comes from the
//! oEmbed endpoint for the locator URL.

mod dedup;
pub mod error;
pub mod retry;
pub mod transcript;

pub use error::FetchError;
pub use retry::{RetryPolicy, run_with_retry};
pub use transcript::{ClientConfig, ContentFetcher, TranscriptClient, VideoMetadata};
