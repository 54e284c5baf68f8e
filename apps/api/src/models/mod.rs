pub mod profile;
pub mod tailoring;

pub use profile::{load_profile, normalize_title, Profile, ProfileError, Project};
pub use tailoring::TailoringResult;
