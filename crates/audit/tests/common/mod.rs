pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{APP, Archive, Harness, ORG};
#[allow(unused_imports)]
pub use mocks::{CountingCatalog, MemoryStore};
