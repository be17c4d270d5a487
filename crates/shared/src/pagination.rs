use std::num::NonZeroU32;

use serde::Serialize;

/// Reads the `page` query parameter. Anything that is not a positive integer
/// falls back to the first page instead of failing the request. Integers too
/// large for `u32` saturate, so the paginator clamps them to the last page.
pub fn parse_page(raw: Option<&str>) -> u32 {
    let Some(value) = raw.map(str::trim) else {
        return 1;
    };
    let digits = value.strip_prefix('+').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return 1;
    }
    match digits.parse::<u32>() {
        Ok(0) => 1,
        Ok(page) => page,
        Err(_) => u32::MAX,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: NonZeroU32,
}

impl Paginator {
    pub fn new(per_page: NonZeroU32) -> Self {
        Self { per_page }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.get()
    }

    /// An empty collection still has one (empty) page.
    pub fn num_pages(&self, total_count: u64) -> u32 {
        let pages = total_count.div_ceil(u64::from(self.per_page()));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    /// Resolves a requested page number against the collection size, clamping
    /// past-the-end requests to the last page.
    pub fn window(&self, requested: u32, total_count: u64) -> PageWindow {
        let num_pages = self.num_pages(total_count);
        let number = requested.clamp(1, num_pages);
        PageWindow {
            number,
            num_pages,
            offset: (number - 1).saturating_mul(self.per_page()),
            limit: self.per_page(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
    pub total_count: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total_count: u64) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            per_page: window.limit,
            total_count,
            has_previous: window.number > 1,
            has_next: window.number < window.num_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator(per_page: u32) -> Paginator {
        Paginator::new(NonZeroU32::new(per_page).expect("non-zero"))
    }

    #[test]
    fn malformed_or_missing_page_defaults_to_first() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(Some("2.5")), 1);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-3")), 1);
        assert_eq!(parse_page(Some(" 7 ")), 7);
        assert_eq!(parse_page(Some("+4")), 4);
        assert_eq!(parse_page(Some("+")), 1);
    }

    #[test]
    fn oversized_page_saturates_and_clamps_to_last() {
        assert_eq!(parse_page(Some("99999999999")), u32::MAX);
        assert_eq!(parse_page(Some("4294967296")), u32::MAX);

        let window = paginator(10).window(parse_page(Some("99999999999")), 25);
        assert_eq!(window.number, 3);
        assert_eq!(window.offset, 20);
    }

    #[test]
    fn num_pages_rounds_up_and_never_drops_below_one() {
        let p = paginator(10);
        assert_eq!(p.num_pages(0), 1);
        assert_eq!(p.num_pages(10), 1);
        assert_eq!(p.num_pages(11), 2);
        assert_eq!(p.num_pages(25), 3);
    }

    #[test]
    fn window_clamps_past_the_end_to_last_page() {
        let p = paginator(10);
        let window = p.window(99, 25);
        assert_eq!(window.number, 3);
        assert_eq!(window.offset, 20);
        assert_eq!(window.limit, 10);

        let empty = p.window(5, 0);
        assert_eq!(empty.number, 1);
        assert_eq!(empty.offset, 0);
    }

    #[test]
    fn page_flags_follow_position() {
        let p = paginator(2);
        let middle = Page::new(vec![3, 4], p.window(2, 5), 5);
        assert!(middle.has_previous && middle.has_next);
        let last = Page::new(vec![5], p.window(3, 5), 5);
        assert!(last.has_previous && !last.has_next);
    }
}
