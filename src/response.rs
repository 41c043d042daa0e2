use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page number whose offset still fits in an `i64`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageMeta>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
            pagination: None,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            pagination: None,
        })
    }

    pub fn paged(data: T, pagination: PageMeta) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
            pagination: Some(pagination),
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data: None,
            pagination: None,
        })
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
}

/// Normalized page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.filter(|p| *p >= 1).unwrap_or(1).min(MAX_PAGE),
            limit: limit
                .filter(|l| *l >= 1)
                .map(|l| l.min(MAX_PAGE_SIZE))
                .unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn meta(&self, total_items: i64) -> PageMeta {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + self.limit - 1) / self.limit
        };
        PageMeta {
            current_page: self.page,
            total_pages,
            total_items,
            items_per_page: self.limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Resolve a client sort column against a fixed whitelist so raw input never reaches SQL.
pub fn resolve_sort(
    requested: Option<&str>,
    order: Option<SortOrder>,
    allowed: &[&'static str],
    default: (&'static str, SortOrder),
) -> Result<(&'static str, SortOrder), AppError> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok((default.0, order.unwrap_or(default.1))),
        Some(col) => allowed
            .iter()
            .find(|c| **c == col)
            .map(|c| (*c, order.unwrap_or(SortOrder::Asc)))
            .ok_or_else(|| AppError::field("sortBy", "unsupported sort column")),
    }
}

/// Trim a free-text search term; blank input means "no search".
pub fn search_term(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        assert_eq!(Page::new(None, None), Page { page: 1, limit: DEFAULT_PAGE_SIZE });
        assert_eq!(Page::new(Some(0), Some(0)), Page { page: 1, limit: DEFAULT_PAGE_SIZE });
        assert_eq!(Page::new(Some(3), Some(500)).limit, MAX_PAGE_SIZE);
        assert_eq!(Page::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn huge_page_is_clamped_and_offset_stays_positive() {
        let page = Page::new(Some(i64::MAX), Some(10));
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.offset() > 0);
        let page = Page::new(Some(i64::MAX), Some(MAX_PAGE_SIZE));
        assert_eq!(page.offset(), (MAX_PAGE - 1) * MAX_PAGE_SIZE);
        assert_eq!(page.meta(25).current_page, MAX_PAGE);
    }

    #[test]
    fn meta_rounds_pages_up() {
        let meta = Page::new(Some(2), Some(20)).meta(41);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.current_page, 2);
        assert_eq!(Page::new(None, None).meta(0).total_pages, 0);
    }

    #[test]
    fn meta_serializes_camel_case() {
        let json = serde_json::to_value(Page::new(Some(1), Some(10)).meta(5)).unwrap();
        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["itemsPerPage"], 10);
        assert_eq!(json["totalItems"], 5);
        assert_eq!(json["totalPages"], 1);
    }

    #[test]
    fn sort_whitelist_rejects_unknown_columns() {
        let allowed = ["full_name", "created_at"];
        let default = ("created_at", SortOrder::Desc);
        assert_eq!(
            resolve_sort(None, None, &allowed, default).unwrap(),
            ("created_at", SortOrder::Desc)
        );
        assert_eq!(
            resolve_sort(Some("full_name"), Some(SortOrder::Desc), &allowed, default).unwrap(),
            ("full_name", SortOrder::Desc)
        );
        assert!(resolve_sort(Some("1; DROP TABLE persons"), None, &allowed, default).is_err());
    }

    #[test]
    fn search_term_is_trimmed_and_escaped() {
        assert_eq!(search_term(Some("  ")), None);
        assert_eq!(search_term(None), None);
        assert_eq!(search_term(Some(" an ")).as_deref(), Some("%an%"));
        assert_eq!(search_term(Some("50%")).as_deref(), Some("%50\\%%"));
    }

    #[test]
    fn message_envelope_omits_data() {
        let Json(body) = ApiResponse::message("deleted");
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "message": "deleted"}));
    }
}
