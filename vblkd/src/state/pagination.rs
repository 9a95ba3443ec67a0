use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::config::PaginationConfig;
use crate::error::Error;

/// Page tokens handed out by List, mapped to the offset they resume at.
///
/// Tokens are never reused for a different offset and are not removed when
/// redeemed, so a client may retry a page.
#[derive(Default)]
pub struct PageCursors {
    offsets: Mutex<HashMap<String, usize>>,
}

/// The slice of a listing one List call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub size: usize,
}

impl PageCursors {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.offsets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Issue a fresh token that resumes at `offset`.
    pub fn mint(&self, offset: usize) -> String {
        let token = Uuid::new_v4().to_string();
        self.lock().insert(token.clone(), offset);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<usize> {
        self.lock().get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Turn the request's page size and token into a window.
    ///
    /// Size zero selects the configured default and sizes above the
    /// configured maximum are clamped.
    pub fn window(
        &self,
        page_size: i32,
        page_token: &str,
        limits: &PaginationConfig,
    ) -> Result<PageWindow, Error> {
        let size = match page_size {
            n if n < 0 => return Err(Error::NegativePageSize(n)),
            0 => limits.default_page_size,
            n => (n as usize).min(limits.max_page_size),
        };

        let offset = if page_token.is_empty() {
            0
        } else {
            self.resolve(page_token)
                .ok_or_else(|| Error::PageTokenNotFound(page_token.to_string()))?
        };

        Ok(PageWindow { offset, size })
    }
}

impl PageWindow {
    /// Cut the window out of `items`. Returns the page and whether more
    /// items follow it.
    pub fn apply<T>(&self, items: Vec<T>) -> (Vec<T>, bool) {
        let end = self.offset.saturating_add(self.size);
        let has_more = end < items.len();
        let page = items.into_iter().skip(self.offset).take(self.size).collect();
        (page, has_more)
    }

    /// Offset the next page starts at.
    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }
}
