/// Optional page/limit query parameters for list endpoints. When neither is
/// given, listings return everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationParams {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self { page, limit }
    }

    /// SQL OFFSET derived from the effective (capped) limit, so page
    /// boundaries stay consistent when callers ask for oversized pages.
    pub fn offset(&self) -> Option<i64> {
        self.effective_limit().map(|limit| {
            let page = self.page.unwrap_or(1).max(1);
            (page - 1) * limit
        })
    }

    pub fn effective_limit(&self) -> Option<i64> {
        match self.limit {
            Some(limit) => Some(limit.clamp(1, Self::MAX_LIMIT)),
            None if self.page.is_some() => Some(Self::DEFAULT_LIMIT),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_params_means_no_pagination() {
        let params = PaginationParams::default();
        assert_eq!(params.effective_limit(), None);
        assert_eq!(params.offset(), None);
    }

    #[test]
    fn page_without_limit_uses_default() {
        let params = PaginationParams::new(Some(3), None);
        assert_eq!(params.effective_limit(), Some(PaginationParams::DEFAULT_LIMIT));
        assert_eq!(params.offset(), Some(2 * PaginationParams::DEFAULT_LIMIT));
    }

    #[test]
    fn limit_is_capped() {
        let params = PaginationParams::new(Some(2), Some(10_000));
        assert_eq!(params.effective_limit(), Some(PaginationParams::MAX_LIMIT));
        assert_eq!(params.offset(), Some(PaginationParams::MAX_LIMIT));
    }
}
