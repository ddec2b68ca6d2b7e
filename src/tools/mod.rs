//! Source acquisition tools
//!
//! Leaf components that touch the outside world on behalf of the research
//! pipeline.
//!
//! # Module Structure
//!
//! - [`search`](crate::tools::search) - Web search retrievers (DuckDuckGo, SearXNG)
//! - [`scraper`](crate::tools::scraper) - Concurrent fetch & extract with strategy dispatch
//! - [`documents`](crate::tools::documents) - Uploaded-file loading and conversion
//!
//! # Example
//!
//! ```ignore
//! let scraper = Scraper::from_config(&config, client, Arc::new(PlainTextConverter))?;
//! let documents = scraper.run(&urls).await;  // failures are logged and dropped
//! ```

/// Uploaded-file loading and conversion.
pub mod documents;
/// Bounded-concurrency link extraction.
pub mod scraper;
/// Search retrievers.
pub mod search;

pub use self::documents::{DocumentConverter, FileKind, FileLoader, PlainTextConverter};
pub use self::scraper::{ContentExtractor, FetchFailure, Scraper, TranscriptSource, WebExtractor};
pub use self::search::{SearchRetriever, retriever_from_config};
