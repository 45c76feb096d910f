/// 1-based page window clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_inputs() {
        let p = Pagination::new(Some(0), Some(500), 10);
        assert_eq!(p, Pagination { page: 1, per_page: 100 });
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(Some(3), None, 5);
        assert_eq!(p.per_page, 5);
        assert_eq!(p.offset(), 10);
        assert_eq!(p.limit(), 5);
    }
}
