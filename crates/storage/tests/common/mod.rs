pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::seed_versions;
#[allow(unused_imports)]
pub use mocks::InstrumentedBackend;
