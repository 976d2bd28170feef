//! Clients for the external geographic reference service.

mod fetcher;
mod geometry;

pub use fetcher::{
    fetch_admin_dataset, fetch_all, AdminDataset, AdminSource, GeorefClient, RecordsPage,
};
pub use geometry::{exact_label_clause, parse_geo_shape, GeometryFetcher};

#[cfg(test)]
pub(crate) use fetcher::tests::StaticAdminSource;
