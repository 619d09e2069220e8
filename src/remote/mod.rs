//! Adapter to the third-party remote scraping service.
//!
//! Grounded on the existing Browserless HTTP client
//! (`scraping/rust_scraper/browserless.rs`): a thin `reqwest`-based client
//! with a shared status-code classifier, generalized here to the remote
//! service's `/scrape`, `/map`, `/crawl`, and `/search` endpoints instead of
//! Browserless's `/content`/`/function`.

pub mod client;
pub mod crawl;
pub mod map;
pub mod scrape_strategy;
pub mod search;

pub use client::RemoteClient;
pub use scrape_strategy::RemoteStrategy;
