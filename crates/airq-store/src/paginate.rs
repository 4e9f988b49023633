//! Continuation-token pagination driver.
//!
//! Range stores return reads one page at a time together with an opaque
//! token for the next page. The walk ends only when a page carries no token:
//! a page may be empty and still have a successor (a partial page from a
//! store that hit its read budget), so the page size says nothing about
//! whether more data follows.

use tracing::trace;

/// One page of results from a paginated read.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, K> {
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page.
    pub next: Option<K>,
}

impl<T, K> Page<T, K> {
    pub fn new(items: Vec<T>, next: Option<K>) -> Self {
        Self { items, next }
    }

    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Walk every page, folding each batch into an accumulator.
///
/// `fetch` receives `None` for the first page and then each returned token.
/// The first error aborts the walk and is returned unchanged.
pub fn fold_pages<T, K, E, A, F, G>(init: A, mut fetch: F, mut fold: G) -> Result<A, E>
where
    F: FnMut(Option<K>) -> Result<Page<T, K>, E>,
    G: FnMut(A, Vec<T>) -> A,
{
    let mut acc = init;
    let mut token = None;
    let mut pages = 0usize;

    loop {
        let page = fetch(token.take())?;
        pages += 1;
        trace!(
            page = pages,
            items = page.items.len(),
            more = page.next.is_some(),
            "Fetched page"
        );

        acc = fold(acc, page.items);

        match page.next {
            Some(next) => token = Some(next),
            None => return Ok(acc),
        }
    }
}

/// Walk every page and concatenate the items in page order.
pub fn collect_pages<T, K, E, F>(fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<K>) -> Result<Page<T, K>, E>,
{
    fold_pages(Vec::new(), fetch, |mut all, batch| {
        all.extend(batch);
        all
    })
}
