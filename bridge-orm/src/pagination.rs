//! # Pagination Module
//!
//! Offset/page-size paging for built queries, plus the page wrapper returned
//! to API callers.
//!
//! ## Features
//!
//! - **Serde Compatibility**: `offsetBy` / `pageSize` deserialize straight from request parameters
//! - **Validation**: page sizes outside the accepted range are rejected
//! - **Query Integration**: `apply` appends `LIMIT`/`OFFSET` to a [`BuiltQuery`]
//!
//! ## Example
//!
//! ```rust,ignore
//! let pagination = Pagination::new(0, 50)?;
//! let page: PagedResults<AccountSummary> = db.fetch_page(&select, &count, &pagination).await?;
//! println!("{} of {}", page.items.len(), page.total);
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, query_builder::BuiltQuery, value_binding::ParamValue};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MIN_PAGE_SIZE: usize = 5;
pub const MAX_PAGE_SIZE: usize = 100;

/// Parameter names bound by [`Pagination::apply`]. Queries must not use them.
pub const PAGE_SIZE_PARAM: &str = "pageSize";
pub const OFFSET_BY_PARAM: &str = "offsetBy";

/// A page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Number of records to skip. Default: 0.
    #[serde(default)]
    pub offset_by: usize,

    /// Number of records per page. Default: 50.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// One page of results with the total the page was cut from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResults<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub offset_by: usize,
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset_by: 0, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    pub fn new(offset_by: usize, page_size: usize) -> Result<Self, Error> {
        let pagination = Self { offset_by, page_size };
        pagination.validate()?;
        Ok(pagination)
    }

    /// Checks the page size bounds. Deserialized values are not checked until this is called.
    pub fn validate(&self) -> Result<(), Error> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidArgument(format!(
                "pageSize must be from {}-{} records",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }

    /// Returns `query` restricted to this page.
    pub fn apply(&self, query: &BuiltQuery) -> BuiltQuery {
        query.extended(
            &format!("LIMIT :{} OFFSET :{}", PAGE_SIZE_PARAM, OFFSET_BY_PARAM),
            [
                (PAGE_SIZE_PARAM.to_string(), ParamValue::from(self.page_size)),
                (OFFSET_BY_PARAM.to_string(), ParamValue::from(self.offset_by)),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::QueryBuilder;

    #[test]
    fn test_defaults() {
        let pagination: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(pagination, Pagination::default());
        assert_eq!(pagination.page_size, 50);

        let pagination: Pagination = serde_json::from_str(r#"{"offsetBy": 10, "pageSize": 20}"#).unwrap();
        assert_eq!(pagination, Pagination { offset_by: 10, page_size: 20 });
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(Pagination::new(0, 5).is_ok());
        assert!(Pagination::new(0, 100).is_ok());
        assert!(matches!(Pagination::new(0, 4), Err(Error::InvalidArgument(_))));
        assert!(matches!(Pagination::new(0, 101), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_apply_appends_limit_and_offset() {
        let mut builder = QueryBuilder::with_base("SELECT * FROM accounts WHERE app_id = :appId");
        builder.bind("appId", "api");
        let query = builder.build();

        let paged = Pagination::new(20, 10).unwrap().apply(&query);
        assert_eq!(paged.query(), "SELECT * FROM accounts WHERE app_id = :appId LIMIT :pageSize OFFSET :offsetBy");
        assert_eq!(paged.parameters()["pageSize"], ParamValue::Int(10));
        assert_eq!(paged.parameters()["offsetBy"], ParamValue::Int(20));
        assert_eq!(paged.parameters()["appId"], ParamValue::from("api"));

        // the original is untouched
        assert_eq!(query.parameters().len(), 1);
    }
}
