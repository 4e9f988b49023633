//! In-memory range store.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use super::{
    BackendError, BackendResult, ContinuationToken, DEFAULT_PAGE_SIZE, ItemPage, Key,
    PartitionQuery, Projection, RangeStore, page_len,
};
use crate::codec::Item;
use crate::paginate::Page;

/// A [`RangeStore`] held in a `BTreeMap`, ordered by key.
///
/// Pages are capped at the configured page size, so callers see the same
/// continuation behaviour as a persistent backend.
#[derive(Debug)]
pub struct MemoryRangeStore {
    items: RwLock<BTreeMap<Key, Item>>,
    page_size: usize,
}

impl Default for MemoryRangeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRangeStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store that returns at most `page_size` items per read.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: PoisonError<T>) -> BackendError {
    BackendError::Unavailable("in-memory store lock poisoned".to_string())
}

/// Take up to `len` items from `candidates` and build the page.
fn build_page<'a, I>(candidates: I, len: usize, projection: Projection) -> ItemPage
where
    I: Iterator<Item = (&'a Key, &'a Item)>,
{
    let mut candidates = candidates.peekable();
    let mut items = Vec::with_capacity(len);
    let mut last = None;

    while items.len() < len {
        let Some((key, item)) = candidates.next() else {
            break;
        };
        items.push(projection.apply(item.clone()));
        last = Some(key.clone());
    }

    let next = match (candidates.peek(), last) {
        (Some(_), Some(last)) => Some(ContinuationToken::after(last)),
        _ => None,
    };
    Page::new(items, next)
}

impl RangeStore for MemoryRangeStore {
    fn put(&self, item: Item) -> BackendResult<()> {
        let key = Key::of(&item).ok_or_else(|| {
            BackendError::Failed("item is missing a string DeviceID or Timestamp".to_string())
        })?;
        self.items.write().map_err(poisoned)?.insert(key, item);
        Ok(())
    }

    fn query_partition(&self, query: &PartitionQuery) -> BackendResult<ItemPage> {
        let items = self.items.read().map_err(poisoned)?;
        let len = page_len(self.page_size, query.limit);

        let partition = items
            .iter()
            .filter(|(key, _)| key.device_id == query.device_id)
            .filter(|(key, _)| query.is_after_start(key));

        let page = if query.scan_forward {
            build_page(partition, len, query.projection)
        } else {
            let newest_first: Vec<_> = partition.collect();
            build_page(newest_first.into_iter().rev(), len, query.projection)
        };
        Ok(page)
    }

    fn scan_all(
        &self,
        projection: Projection,
        start: Option<ContinuationToken>,
    ) -> BackendResult<ItemPage> {
        let items = self.items.read().map_err(poisoned)?;
        let candidates = items
            .iter()
            .filter(|(key, _)| start.as_ref().is_none_or(|token| *key > token.key()));
        Ok(build_page(candidates, self.page_size, projection))
    }

    fn batch_delete(&self, keys: &[Key]) -> BackendResult<()> {
        let mut items = self.items.write().map_err(poisoned)?;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}
