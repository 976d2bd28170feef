//! Access to the external listing store.

mod client;
mod memory;
mod store;

pub use client::{parse_content_range_total, PostgrestClient};
pub use memory::InMemoryListingStore;
pub use store::{CountQuery, ListingPage, ListingStore, ListingTable};
