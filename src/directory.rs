//! Directory filtering, search and per-status tallies used by the views.

use serde::Serialize;

use crate::models::{Business, BusinessStatus, IncomeRecord};

/// Status filter applied before the text search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(BusinessStatus),
}

impl StatusFilter {
    /// Accepts `all`, a status name, or nothing.
    pub fn parse(value: Option<&str>) -> Result<Self, String> {
        match value.map(str::trim) {
            None | Some("") => Ok(StatusFilter::All),
            Some(v) if v.eq_ignore_ascii_case("all") => Ok(StatusFilter::All),
            Some(v) => v.parse().map(StatusFilter::Only),
        }
    }

    pub fn matches(&self, business: &Business) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => business.status == *status,
        }
    }
}

/// Fields the text search looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFields {
    /// name, industry, location and description
    Directory,
    /// name and industry
    Admin,
}

pub fn matches_query(business: &Business, query: &str, fields: SearchFields) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

    let base = contains(&business.name) || contains(&business.industry);
    match fields {
        SearchFields::Admin => base,
        SearchFields::Directory => {
            base || contains(&business.location)
                || business.description.as_deref().is_some_and(contains)
        }
    }
}

/// Businesses passing both the status filter and the text search, in input order.
pub fn search<'a>(
    businesses: &'a [Business],
    query: &str,
    filter: StatusFilter,
    fields: SearchFields,
) -> Vec<&'a Business> {
    businesses
        .iter()
        .filter(|b| filter.matches(b))
        .filter(|b| matches_query(b, query, fields))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub all: usize,
    pub pending: usize,
    pub verified: usize,
    pub unverified: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn tally<'a>(businesses: impl IntoIterator<Item = &'a Business>) -> Self {
        let mut counts = StatusCounts::default();
        for business in businesses {
            counts.all += 1;
            match business.status {
                BusinessStatus::Pending => counts.pending += 1,
                BusinessStatus::Verified => counts.verified += 1,
                BusinessStatus::Unverified => counts.unverified += 1,
                BusinessStatus::Rejected => counts.rejected += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
}

/// Revenue summary over a business's income history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeSummary {
    pub months: usize,
    pub latest: i64,
    pub max: i64,
    pub min: i64,
    pub trend: Trend,
    /// Absolute change from the first to the latest month, in percent.
    /// `None` when the first month is zero.
    pub percent_change: Option<f64>,
}

impl IncomeSummary {
    /// `records` must be ordered by month.
    pub fn from_records(records: &[IncomeRecord]) -> Option<Self> {
        let first = records.first()?.amount;
        let latest = records.last()?.amount;
        let max = records.iter().map(|r| r.amount).max()?;
        let min = records.iter().map(|r| r.amount).min()?;

        let percent_change = if first == 0 {
            None
        } else {
            let change = ((latest - first) as f64 / first as f64 * 100.0).abs();
            Some((change * 10.0).round() / 10.0)
        };

        Some(IncomeSummary {
            months: records.len(),
            latest,
            max,
            min,
            trend: if latest >= first { Trend::Up } else { Trend::Down },
            percent_change,
        })
    }
}
