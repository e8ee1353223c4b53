//! Lazy, cursor-driven pagination shared by the site adapters.
//!
//! Each adapter knows how to fetch one page given a cursor and how to tell
//! whether another page follows. [`paginate`] turns that into a lazy stream
//! of listing URLs: pages are only fetched as the consumer pulls, and a fresh
//! call always starts again from the first cursor.

use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt};

use crate::error::ScraperError;

/// One fetched search page.
#[derive(Debug)]
pub struct Page<C> {
    pub urls: Vec<String>,
    /// Cursor for the following page. `None` marks the terminal page.
    pub next: Option<C>,
}

impl<C> Page<C> {
    /// A page with no results and no successor.
    #[must_use]
    pub fn terminal() -> Self {
        Self {
            urls: Vec::new(),
            next: None,
        }
    }
}

enum State<C> {
    Next { cursor: C, pages: usize },
    Done,
}

/// Streams listing URLs page by page, starting from `first`.
///
/// The stream ends after the terminal page (a page whose `next` is `None`).
/// A page-fetch error is yielded once and then the stream ends. When more
/// than `max_pages` pages would be fetched, [`ScraperError::PaginationLimit`]
/// is yielded instead of the next page.
#[must_use]
pub fn paginate<'a, C, F, Fut>(
    site: &'static str,
    first: C,
    max_pages: usize,
    fetch_page: F,
) -> BoxStream<'a, Result<String, ScraperError>>
where
    C: Send + 'a,
    F: Fn(C) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<C>, ScraperError>> + Send + 'a,
{
    let initial = State::Next {
        cursor: first,
        pages: 0,
    };

    stream::unfold(
        (initial, fetch_page),
        move |(state, fetch_page)| async move {
            let State::Next { cursor, pages } = state else {
                return None;
            };

            if pages >= max_pages {
                tracing::warn!(site, max_pages, "pagination limit reached");
                let err = ScraperError::PaginationLimit { site, max_pages };
                return Some((vec![Err(err)], (State::Done, fetch_page)));
            }

            match fetch_page(cursor).await {
                Ok(page) => {
                    tracing::debug!(site, page = pages + 1, urls = page.urls.len(), "search page");
                    let next = match page.next {
                        Some(cursor) => State::Next {
                            cursor,
                            pages: pages + 1,
                        },
                        None => State::Done,
                    };
                    let items = page.urls.into_iter().map(Ok).collect::<Vec<_>>();
                    Some((items, (next, fetch_page)))
                }
                Err(e) => Some((vec![Err(e)], (State::Done, fetch_page))),
            }
        },
    )
    .flat_map(stream::iter)
    .boxed()
}
