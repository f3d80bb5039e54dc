//! Publication sources.
//!
//! A source adapter talks to one external provider and hands back raw
//! records. The pipeline only sees this trait, so sources can be swapped
//! for fixtures in tests.

use crate::error::Result;
use crate::record::RawRecord;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`PublicationSource::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<RawRecord>>> + Send + 'a>>;

/// A provider of raw bibliographic records.
pub trait PublicationSource: Send + Sync {
    /// Short name used in logs, e.g. "orcid".
    fn name(&self) -> &str;

    /// Fetch every record this source has for the configured author.
    fn fetch(&self) -> FetchFuture<'_>;
}

/// Fixed-response source.
pub mod mock {
    use super::*;
    use crate::error::PubfetchError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What a [`MockSource`] returns on every call.
    #[derive(Debug, Clone)]
    pub enum MockResponse {
        Records(Vec<RawRecord>),
        Unavailable(String),
    }

    /// A source that returns a canned response and counts calls.
    pub struct MockSource {
        name: &'static str,
        response: MockResponse,
        calls: AtomicUsize,
    }

    impl MockSource {
        pub fn new(name: &'static str, response: MockResponse) -> Self {
            Self {
                name,
                response,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn records(name: &'static str, records: Vec<RawRecord>) -> Self {
            Self::new(name, MockResponse::Records(records))
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PublicationSource for MockSource {
        fn name(&self) -> &str {
            self.name
        }

        fn fetch(&self) -> FetchFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self.response.clone();
            let name = self.name.to_string();
            Box::pin(async move {
                match response {
                    MockResponse::Records(records) => Ok(records),
                    MockResponse::Unavailable(reason) => Err(PubfetchError::SourceUnavailable {
                        source_name: name,
                        reason,
                    }),
                }
            })
        }
    }
}
