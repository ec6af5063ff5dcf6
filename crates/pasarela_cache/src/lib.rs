mod entry;
mod store;

pub use entry::StoredResponse;
pub use store::ResponseCache;
