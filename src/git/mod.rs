pub mod cache;
pub mod repository;

pub use cache::{CacheError, CacheStatus, VendorVerifyCache};
pub use repository::CachedRepository;

#[cfg(test)]
pub(crate) mod testing;
