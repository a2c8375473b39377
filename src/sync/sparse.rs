use tracing::warn;

/// Place `items` at `offset` inside a list of `total` slots.
///
/// Slots outside the item range are `None`. When there are at least `total`
/// items they are returned as they are. Items that would land past `total`
/// are dropped.
pub fn create_sparse_array<T>(total: usize, offset: usize, items: Vec<T>) -> Vec<Option<T>> {
  if items.len() >= total {
    return items.into_iter().map(Some).collect();
  }

  let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
  let count = items.len();
  for (slot, item) in slots.iter_mut().skip(offset).zip(items) {
    *slot = Some(item);
  }

  if offset.saturating_add(count) > total {
    warn!(total, offset, count, "page extends past the list length");
  }
  slots
}

/// [`create_sparse_array`] for page `page_index` of size `page_size`.
pub fn materialize_page<T>(
  total: usize,
  page_size: usize,
  page_index: usize,
  items: Vec<T>,
) -> Vec<Option<T>> {
  create_sparse_array(total, page_size.saturating_mul(page_index), items)
}
