pub mod profile;

pub use profile::{Profile, ProfileUpdate, TargetRole};
