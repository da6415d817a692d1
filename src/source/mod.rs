//! Timeline source collaborators.
//!
//! A [`TimelineSource`] answers two questions: who is this handle, and what
//! is on one page of their timeline. [`Paginator`] chains pages into a lazy
//! record sequence.

mod http;
mod memory;

pub use http::HttpTimelineSource;
pub use memory::MemorySource;

use crate::Result;
use crate::models::{Cursor, Record, UserInfo};
use std::collections::VecDeque;

/// Page size used when a source does not say otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One page request against a user's timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Source-side user identity.
    pub user_id: String,
    /// Inclusive lower bound on `created_at`.
    pub start_time: Option<Cursor>,
    /// Records wanted on this page.
    pub max_results: usize,
    /// Continuation token from the previous page.
    pub pagination_token: Option<String>,
}

/// One page of timeline records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelinePage {
    /// Records on the page, newest first as the source returns them.
    pub records: Vec<Record>,
    /// Token for the next page, absent on the last one.
    pub next_token: Option<String>,
}

/// Paginated timeline API.
pub trait TimelineSource: Send + Sync {
    /// Looks up a user by handle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EntityNotFound`] if the source has no such
    /// user, or [`crate::Error::OperationFailed`] on transport failures.
    fn get_user(&self, handle: &str) -> Result<UserInfo>;

    /// Fetches a single page.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    fn fetch_page(&self, request: &PageRequest) -> Result<TimelinePage>;

    /// Records requested per page.
    fn page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }
}

impl dyn TimelineSource + '_ {
    /// Returns a lazy sequence over the user's timeline.
    ///
    /// `max_results` of `None` follows pagination to the end.
    #[must_use]
    pub fn paginate_timeline(
        &self,
        user_id: &str,
        start: Option<&Cursor>,
        max_results: Option<usize>,
    ) -> Paginator<'_> {
        Paginator::new(self, user_id, start, max_results)
    }
}

/// Lazy, finite, non-restartable record sequence over timeline pages.
///
/// The next page is only requested once the buffered one is drained.
/// Iteration ends when `max_results` records were yielded or a page carries
/// no continuation token. The first error is yielded once, after which the
/// iterator is fused.
pub struct Paginator<'a> {
    source: &'a dyn TimelineSource,
    request: PageRequest,
    remaining: Option<usize>,
    buffer: VecDeque<Record>,
    last_page: bool,
    done: bool,
    pages: usize,
}

impl<'a> Paginator<'a> {
    /// Starts pagination against `source`.
    #[must_use]
    pub fn new(
        source: &'a dyn TimelineSource,
        user_id: &str,
        start: Option<&Cursor>,
        max_results: Option<usize>,
    ) -> Self {
        Self {
            source,
            request: PageRequest {
                user_id: user_id.to_string(),
                start_time: start.cloned(),
                max_results: source.page_size(),
                pagination_token: None,
            },
            remaining: max_results,
            buffer: VecDeque::new(),
            last_page: false,
            done: false,
            pages: 0,
        }
    }

    /// Pages requested so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn fetch_next_page(&mut self) -> Result<()> {
        let page_size = self.source.page_size();
        self.request.max_results = self.remaining.map_or(page_size, |r| r.min(page_size));

        let page = self.source.fetch_page(&self.request)?;
        self.pages += 1;
        tracing::debug!(
            user_id = %self.request.user_id,
            page = self.pages,
            records = page.records.len(),
            has_next = page.next_token.is_some(),
            "Fetched timeline page"
        );

        match page.next_token {
            Some(token) => self.request.pagination_token = Some(token),
            None => self.last_page = true,
        }
        self.buffer.extend(page.records);
        Ok(())
    }
}

impl Iterator for Paginator<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.remaining == Some(0) {
                return None;
            }
            if let Some(record) = self.buffer.pop_front() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Some(Ok(record));
            }
            if self.last_page {
                self.done = true;
                return None;
            }
            if let Err(e) = self.fetch_next_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

impl std::iter::FusedIterator for Paginator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn timeline(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(format!("{i}"), format!("2024-01-01T00:00:{:02}.000Z", i % 60)))
            .collect()
    }

    #[test]
    fn test_paginator_stops_at_max_results() {
        let source: Arc<dyn TimelineSource> = Arc::new(
            MemorySource::new()
                .with_page_size(10)
                .with_user(UserInfo::new("1", "alice"), timeline(35)),
        );

        let mut pages = source.paginate_timeline("1", None, Some(25));
        let ids: Vec<_> = pages.by_ref().map(|r| r.unwrap().id).collect();
        assert_eq!(ids.len(), 25);
        assert_eq!(pages.pages_fetched(), 3);
    }

    #[test]
    fn test_paginator_unbounded_reads_everything() {
        let memory = MemorySource::new()
            .with_page_size(10)
            .with_user(UserInfo::new("1", "alice"), timeline(35));
        let source: &dyn TimelineSource = &memory;

        let records: Result<Vec<_>> = source.paginate_timeline("1", None, None).collect();
        assert_eq!(records.unwrap().len(), 35);
    }

    #[test]
    fn test_paginator_is_lazy() {
        let memory = MemorySource::new()
            .with_page_size(5)
            .with_user(UserInfo::new("1", "alice"), timeline(20));
        let source: &dyn TimelineSource = &memory;

        let mut pages = source.paginate_timeline("1", None, None);
        assert_eq!(pages.pages_fetched(), 0);
        pages.next();
        assert_eq!(pages.pages_fetched(), 1);
    }

    struct FailingSource {
        calls: AtomicUsize,
    }

    impl TimelineSource for FailingSource {
        fn get_user(&self, handle: &str) -> Result<UserInfo> {
            Err(Error::EntityNotFound {
                entity: handle.to_string(),
            })
        }

        fn fetch_page(&self, _request: &PageRequest) -> Result<TimelinePage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok(TimelinePage {
                    records: timeline(2),
                    next_token: Some("next".to_string()),
                })
            } else {
                Err(Error::OperationFailed {
                    operation: "fetch_page".to_string(),
                    cause: "connection reset".to_string(),
                })
            }
        }
    }

    #[test]
    fn test_paginator_fuses_after_error() {
        let source = FailingSource {
            calls: AtomicUsize::new(0),
        };
        let mut pages = Paginator::new(&source, "1", None, None);

        assert!(pages.next().unwrap().is_ok());
        assert!(pages.next().unwrap().is_ok());
        assert!(matches!(pages.next(), Some(Err(Error::OperationFailed { .. }))));
        assert!(pages.next().is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
