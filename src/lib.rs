pub mod adapters;
pub mod bucket;
pub mod cloud;
pub mod model;
pub mod util;

pub use bucket::{SizeFallback, SwiftBucket};
pub use cloud::CloudBucket;
pub use model::error::{BucketError, BucketResult};
