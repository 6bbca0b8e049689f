use tracing::trace;

pub const PAGE_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    current_page: usize,
    page_size: usize,
    total_pages: usize,
}

pub fn compute_total_pages(total_count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(page_size)
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Pagination {
            current_page: 1,
            page_size: page_size.max(1),
            total_pages: 0,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn set_total_count(&mut self, total_count: usize) {
        self.total_pages = compute_total_pages(total_count, self.page_size);
        trace!(
            "Total count {total_count} with page size {} => {} pages",
            self.page_size, self.total_pages
        );
    }

    fn clamp(&self, page: usize) -> usize {
        page.clamp(1, self.total_pages.max(1))
    }

    /// Moves to `page` clamped into `[1, total_pages]`.
    /// Returns true if the current page changed.
    pub fn go_to(&mut self, page: usize) -> bool {
        let target = self.clamp(page);
        let changed = target != self.current_page;
        self.current_page = target;
        changed
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.current_page.saturating_add(1))
    }

    pub fn previous(&mut self) -> bool {
        self.go_to(self.current_page.saturating_sub(1))
    }

    pub fn first(&mut self) -> bool {
        self.go_to(1)
    }

    pub fn last(&mut self) -> bool {
        self.go_to(self.total_pages)
    }

    /// Pulls the current page back into range after the page count shrank.
    /// A count of zero pages (no total known) leaves the page alone.
    pub fn clamp_current(&mut self) -> bool {
        if self.total_pages == 0 || self.current_page <= self.total_pages {
            return false;
        }
        self.current_page = self.total_pages;
        true
    }

    /// Page 1 without regard to the known page count, used before re-fetching.
    pub fn reset(&mut self) -> bool {
        let changed = self.current_page != 1;
        self.current_page = 1;
        changed
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Up to five page numbers starting two before the current page.
    pub fn window(&self) -> Vec<usize> {
        let start = self.current_page as isize - 2;
        (start..start + PAGE_WINDOW as isize)
            .filter(|&p| p >= 1 && p as usize <= self.total_pages)
            .map(|p| p as usize)
            .collect()
    }
}
