//! In-process timeline source.

use super::{DEFAULT_PAGE_SIZE, PageRequest, TimelinePage, TimelineSource};
use crate::models::{Record, UserInfo, parse_timestamp};
use crate::{Error, Result};
use std::collections::HashMap;

/// Timeline source backed by fixed per-user record lists.
///
/// Pages are cut with numeric offset tokens; `start_time` is inclusive, the
/// same as the remote API.
#[derive(Debug, Clone)]
pub struct MemorySource {
    users: HashMap<String, UserInfo>,
    timelines: HashMap<String, Vec<Record>>,
    page_size: usize,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self {
            users: HashMap::new(),
            timelines: HashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user and their timeline.
    #[must_use]
    pub fn with_user(mut self, user: UserInfo, records: Vec<Record>) -> Self {
        self.timelines.insert(user.id.clone(), records);
        self.users.insert(user.username.clone(), user);
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Adds records to an already registered user's timeline.
    pub fn push_records(&mut self, handle: &str, records: impl IntoIterator<Item = Record>) {
        if let Some(user) = self.users.get(handle) {
            self.timelines
                .entry(user.id.clone())
                .or_default()
                .extend(records);
        }
    }
}

impl TimelineSource for MemorySource {
    fn get_user(&self, handle: &str) -> Result<UserInfo> {
        self.users
            .get(handle)
            .cloned()
            .ok_or_else(|| Error::EntityNotFound {
                entity: handle.to_string(),
            })
    }

    fn fetch_page(&self, request: &PageRequest) -> Result<TimelinePage> {
        let Some(timeline) = self.timelines.get(&request.user_id) else {
            return Err(Error::EntityNotFound {
                entity: request.user_id.clone(),
            });
        };

        let start = request
            .start_time
            .as_ref()
            .map(|cursor| parse_timestamp(cursor.as_str()))
            .transpose()?;
        let mut visible = Vec::with_capacity(timeline.len());
        for record in timeline {
            let created = parse_timestamp(&record.created_at)?;
            if start.is_none_or(|start| created >= start) {
                visible.push(record);
            }
        }

        let offset = match request.pagination_token.as_deref() {
            Some(token) => token.parse::<usize>().map_err(|_| {
                Error::InvalidInput(format!("unknown pagination token '{token}'"))
            })?,
            None => 0,
        };
        let end = offset.saturating_add(request.max_results.max(1)).min(visible.len());
        let records = visible
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|record| (*record).clone())
            .collect();

        Ok(TimelinePage {
            records,
            next_token: (end < visible.len()).then(|| end.to_string()),
        })
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cursor;

    fn source() -> MemorySource {
        MemorySource::new().with_user(
            UserInfo::new("42", "alice"),
            vec![
                Record::new("3", "2024-01-03T00:00:00.000Z"),
                Record::new("2", "2024-01-02T00:00:00.000Z"),
                Record::new("1", "2024-01-01T00:00:00.000Z"),
            ],
        )
    }

    #[test]
    fn test_get_user() {
        let source = source();
        assert_eq!(source.get_user("alice").unwrap().id, "42");
        assert!(matches!(
            source.get_user("bob"),
            Err(Error::EntityNotFound { entity }) if entity == "bob"
        ));
    }

    #[test]
    fn test_start_time_is_inclusive() {
        let source = source();
        let request = PageRequest {
            user_id: "42".to_string(),
            start_time: Some(Cursor::after("2024-01-01T23:59:59.000Z").unwrap()),
            max_results: 10,
            pagination_token: None,
        };
        let page = source.fetch_page(&request).unwrap();
        let ids: Vec<_> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_start_time_with_plain_timestamps() {
        let source = MemorySource::new().with_user(
            UserInfo::new("42", "alice"),
            vec![
                Record::new("3", "2024-01-03T00:00:00"),
                Record::new("2", "2024-01-02T00:00:00"),
                Record::new("1", "2024-01-01T00:00:00"),
            ],
        );
        let request = PageRequest {
            user_id: "42".to_string(),
            start_time: Some(Cursor::after("2024-01-02T00:00:00").unwrap()),
            max_results: 10,
            pagination_token: None,
        };
        let page = source.fetch_page(&request).unwrap();
        let ids: Vec<_> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);
    }

    #[test]
    fn test_unparseable_record_time_is_an_error() {
        let source = MemorySource::new()
            .with_user(UserInfo::new("42", "alice"), vec![Record::new("1", "soon")]);
        let request = PageRequest {
            user_id: "42".to_string(),
            start_time: None,
            max_results: 10,
            pagination_token: None,
        };
        assert!(matches!(source.fetch_page(&request), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_pagination_tokens() {
        let source = source();
        let mut request = PageRequest {
            user_id: "42".to_string(),
            start_time: None,
            max_results: 2,
            pagination_token: None,
        };
        let first = source.fetch_page(&request).unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        request.pagination_token = first.next_token;
        let second = source.fetch_page(&request).unwrap();
        assert_eq!(second.records.len(), 1);
        assert!(second.next_token.is_none());
    }
}
