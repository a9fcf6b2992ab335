//! Repository traits for catalog operations.

pub mod apps;
pub mod channels;
pub mod deploys;
pub mod leases;
pub mod manifests;
pub mod orgs;
pub mod remediation;
pub mod versions;

pub use apps::AppRepo;
pub use channels::ChannelRepo;
pub use deploys::DeployHistoryRepo;
pub use leases::LeaseRepo;
pub use manifests::ManifestRepo;
pub use orgs::OrgRepo;
pub use remediation::RemediationRepo;
pub use versions::{VersionFilter, VersionRepo};
