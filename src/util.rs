pub mod link;
pub mod stream;
