//! Page-based requests as callers send them, translated to row windows.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::gateway::DatasetGateway;
use crate::query::{QuerySpec, RowPage};

/// Longest search text a request may carry.
pub const MAX_SEARCH_LENGTH: usize = 200;

/// Page size bounds supplied by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 500,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    /// 1-based; defaults to 1
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
}

/// A row page plus the page coordinates that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct PagedRows {
    #[serde(flatten)]
    pub rows: RowPage,
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    /// Translate page coordinates into an offset/limit query.
    ///
    /// Returns the query together with the effective page and page size.
    pub fn to_query(&self, limits: &PageLimits) -> Result<(QuerySpec, usize, usize)> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(GatewayError::InvalidPage(page));
        }
        let page_size = match self.page_size {
            Some(n) if n < 1 => return Err(GatewayError::InvalidLimit(n)),
            Some(n) => n as usize,
            None => limits.default_page_size,
        };
        if page_size > limits.max_page_size {
            return Err(GatewayError::PageSizeTooLarge {
                requested: page_size,
                max: limits.max_page_size,
            });
        }
        if let Some(search) = &self.search {
            if search.chars().count() > MAX_SEARCH_LENGTH {
                return Err(GatewayError::SearchTooLong {
                    max: MAX_SEARCH_LENGTH,
                });
            }
        }

        let offset = (page as usize - 1)
            .checked_mul(page_size)
            .and_then(|o| i64::try_from(o).ok())
            .ok_or(GatewayError::InvalidPage(page))?;

        let spec = QuerySpec {
            offset,
            limit: page_size as i64,
            search: self.search.clone(),
            sort_by: self.sort_by.clone(),
            sort_dir: Some(self.sort_dir.clone().unwrap_or_else(|| "asc".to_string())),
        };
        Ok((spec, page as usize, page_size))
    }

    /// Run this request against a gateway.
    pub fn fetch(&self, gateway: &DatasetGateway, limits: &PageLimits) -> Result<PagedRows> {
        let (spec, page, page_size) = self.to_query(limits)?;
        let rows = gateway.get_rows(&spec)?;
        Ok(PagedRows {
            rows,
            page,
            page_size,
        })
    }
}
