//! Opaque pagination cursors and the page helper.
//!
//! Cursors are server-minted, opaque strings: base64 over a decimal offset.
//! Clients must not parse them. `next_cursor` is present exactly when more
//! pages exist.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One page sliced out of a full listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page
    pub next_cursor: Option<String>,
    /// Total number of items in the listing
    pub total: usize,
}

/// Mint the opaque cursor encoding `offset`
pub fn encode_cursor(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(offset.to_string())
}

/// Decode a client-presented cursor back to an offset
///
/// Returns `None` for cursors this server never minted; callers treat that
/// as an invalid-params condition.
pub fn decode_cursor(cursor: &str) -> Option<usize> {
    let raw = URL_SAFE_NO_PAD.decode(cursor).ok()?;
    std::str::from_utf8(&raw).ok()?.parse().ok()
}

/// Slice one page out of `items`, starting at `cursor`
///
/// An absent cursor starts from the beginning. Offsets past the end yield an
/// empty final page, which tolerates shrinkage between pages (cursors stay
/// valid across changes; skips and duplicates are permitted then).
pub fn paginate<T: Clone>(items: &[T], cursor: Option<&str>, page_size: usize) -> Option<Page<T>> {
    let offset = match cursor {
        Some(c) => decode_cursor(c)?,
        None => 0,
    };

    let end = offset.saturating_add(page_size).min(items.len());
    let slice = if offset >= items.len() {
        Vec::new()
    } else {
        items[offset..end].to_vec()
    };

    let next_cursor = if end < items.len() {
        Some(encode_cursor(end))
    } else {
        None
    };

    Some(Page {
        items: slice,
        next_cursor,
        total: items.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cursor_round_trip() {
        for offset in [0usize, 1, 50, 12_345] {
            assert_eq!(decode_cursor(&encode_cursor(offset)), Some(offset));
        }
        assert_eq!(decode_cursor("!!!not-a-cursor"), None);
    }

    #[test]
    fn pages_cover_everything_exactly_once() {
        let items: Vec<u32> = (0..127).collect();
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = paginate(&items, cursor.as_deref(), DEFAULT_PAGE_SIZE).unwrap();
            seen.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen, items);
    }

    #[test]
    fn single_page_has_no_cursor() {
        let items = vec![1, 2, 3];
        let page = paginate(&items, None, DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(page.items, items);
        assert_eq!(page.next_cursor, None);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn offset_past_end_yields_empty_page() {
        let items = vec![1, 2, 3];
        let cursor = encode_cursor(10);
        let page = paginate(&items, Some(&cursor), DEFAULT_PAGE_SIZE).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn unknown_cursor_is_rejected() {
        let items = vec![1];
        assert!(paginate(&items, Some("garbage!!"), 10).is_none());
    }
}
