//! Batch operation results (§4.6/§7 "batch operations never short-circuit:
//! each item is attempted; the response carries per-item success/error").

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ItemResult<T> {
    pub key: String,
    pub ok: bool,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
}

impl<T> ItemResult<T> {
    #[must_use]
    pub fn ok(key: impl Into<String>, value: T) -> Self {
        Self { key: key.into(), ok: true, error: None, value: Some(value) }
    }

    #[must_use]
    pub fn err(key: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self { key: key.into(), ok: false, error: Some(error.to_string()), value: None }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult<T> {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub results: Vec<ItemResult<T>>,
}

impl<T> BatchResult<T> {
    #[must_use]
    pub fn from_results(results: Vec<ItemResult<T>>) -> Self {
        let total = results.len();
        let success = results.iter().filter(|r| r.ok).count();
        Self { total, success, failed: total - success, results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_success_and_failure() {
        let results = vec![ItemResult::ok("a", ()), ItemResult::err("b", "boom")];
        let batch = BatchResult::from_results(results);
        assert_eq!(batch.total, 2);
        assert_eq!(batch.success, 1);
        assert_eq!(batch.failed, 1);
    }
}
