//! Pagination and name search over branch views.

use serde::{Deserialize, Serialize};

use crate::branches::reconcile::Named;

/// Default page size when a client sends none (or zero).
pub const DEFAULT_LIMIT: usize = 10;

/// Pagination metadata returned next to every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
}

/// One zero-indexed page of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Slice `list` into page `page` of `limit` items.
///
/// `has_more` is `(page + 1) * limit < total`. Pages past the end are empty.
pub fn paginate<T: Clone>(list: &[T], page: usize, limit: usize) -> Page<T> {
    let total = list.len();
    let start = page.saturating_mul(limit).min(total);
    let end = page
        .saturating_add(1)
        .saturating_mul(limit)
        .min(total);

    Page {
        items: list[start..end].to_vec(),
        pagination: Pagination {
            page,
            limit,
            total,
            has_more: page.saturating_add(1).saturating_mul(limit) < total,
        },
    }
}

/// Case-insensitive substring filter on the item name. Blank query keeps everything.
pub fn search<T: Named + Clone>(list: &[T], query: &str) -> Vec<T> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return list.to_vec();
    }
    list.iter()
        .filter(|item| item.name().to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branches::reconcile::RemoteBranchRef;

    fn remote(names: &[&str]) -> Vec<RemoteBranchRef> {
        names
            .iter()
            .map(|n| RemoteBranchRef {
                name: (*n).to_string(),
            })
            .collect()
    }

    #[test]
    fn test_paginate_middle_page() {
        let list: Vec<u32> = (0..25).collect();

        let page = paginate(&list, 1, 10);

        assert_eq!(page.items, (10..20).collect::<Vec<_>>());
        assert_eq!(page.pagination.total, 25);
        assert!(page.pagination.has_more);
    }

    #[test]
    fn test_paginate_last_and_past_end() {
        let list: Vec<u32> = (0..25).collect();

        let last = paginate(&list, 2, 10);
        assert_eq!(last.items.len(), 5);
        assert!(!last.pagination.has_more);

        let past = paginate(&list, 7, 10);
        assert!(past.items.is_empty());
        assert!(!past.pagination.has_more);
    }

    #[test]
    fn test_has_more_matches_formula() {
        for total in 0..12usize {
            let list: Vec<usize> = (0..total).collect();
            for limit in 0..5usize {
                for page in 0..6usize {
                    let p = paginate(&list, page, limit);
                    assert_eq!(
                        p.pagination.has_more,
                        (page + 1) * limit < total,
                        "page={page} limit={limit} total={total}"
                    );
                    assert!(p.items.len() <= limit);
                }
            }
        }
    }

    #[test]
    fn test_paginate_huge_page_does_not_overflow() {
        let list = vec![1, 2, 3];
        let page = paginate(&list, usize::MAX, usize::MAX);
        assert!(page.items.is_empty());
        assert!(!page.pagination.has_more);
    }

    #[test]
    fn test_search_empty_query_is_identity() {
        let list = remote(&["main", "Feature/X"]);
        assert_eq!(search(&list, ""), list);
        assert_eq!(search(&list, "   "), list);
    }

    #[test]
    fn test_search_case_insensitive_substring() {
        let list = remote(&["Feature/X", "main", "release/feature-flags"]);

        let found = search(&list, "feature");

        assert_eq!(found, remote(&["Feature/X", "release/feature-flags"]));
        assert!(search(&list, "nothing").is_empty());
    }
}
