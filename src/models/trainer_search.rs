use serde::{Deserialize, Serialize};

use crate::models::TrainerCard;

pub const DEFAULT_PAGE_SIZE: i64 = 12;
pub const MAX_PAGE_SIZE: i64 = 50;
/// Highest page whose offset still fits in a Postgres BIGINT.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Distance,
}

/// Raw query string of `GET /api/users/trainers`.
#[derive(Debug, Default, Deserialize)]
pub struct TrainerSearchQuery {
    pub search: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub tags: Option<String>,
    pub available: Option<bool>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub sort_by: Option<TrainerSort>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Validated search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerFilter {
    pub search: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub tags: Vec<String>,
    pub available_only: bool,
    pub origin: Option<(f64, f64)>,
    pub sort: TrainerSort,
    pub page: i64,
    pub limit: i64,
}

impl TrainerFilter {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl TrainerSearchQuery {
    pub fn into_filter(self) -> Result<TrainerFilter, String> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err("min_price must not exceed max_price".to_string());
            }
        }
        if self.min_price.is_some_and(|p| p < 0.0) || self.max_price.is_some_and(|p| p < 0.0) {
            return Err("Prices must not be negative".to_string());
        }

        let origin = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                    return Err("lat/lng out of range".to_string());
                }
                Some((lat, lng))
            }
            (None, None) => None,
            _ => return Err("lat and lng must be provided together".to_string()),
        };

        let sort = self.sort_by.unwrap_or_default();
        if sort == TrainerSort::Distance && origin.is_none() {
            return Err("Sorting by distance requires lat and lng".to_string());
        }

        let tags = self
            .tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(TrainerFilter {
            search: non_blank(&self.search),
            location: non_blank(&self.location),
            min_price: self.min_price,
            max_price: self.max_price,
            tags,
            available_only: self.available.unwrap_or(false),
            origin,
            sort,
            page: self.page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        Self {
            total,
            page,
            limit,
            pages: total_pages(total, limit),
        }
    }
}

/// `ceil(total / limit)`
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 || total <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

#[derive(Debug, Serialize)]
pub struct TrainerSearchResponse {
    pub trainers: Vec<TrainerCard>,
    pub pagination: Pagination,
}
