//! Scene discovery against a STAC catalog and coverage request planning.
//!
//! The search client pages through catalog results, the filters prune and
//! deduplicate features, and planning turns the survivors into per-date
//! downloads with WCS URLs.

pub mod client;
pub mod coverage;
pub mod filters;
pub mod models;
pub mod plan;
pub mod query;

pub use client::{CatalogClient, CatalogConfig, SearchSummary, DEFAULT_STAC_ENDPOINT};
pub use coverage::{with_mask, CoverageRequestBuilder, DEFAULT_WCS_ENDPOINT};
pub use filters::{group_by_solar_day, remove_overshoot, remove_slc_off, sort_by_date};
pub use models::{Feature, StacItem, StacItemCollection, StacLink};
pub use plan::{plan_downloads, Download, Purpose};
pub use query::{Collection, QueryParameters, DEFAULT_PAGE_LIMIT, DEFAULT_RESOLUTION};
