// Library exports for Corkboard
// The HTTP layer lives elsewhere; everything here takes plain values and an
// explicit store handle.

pub mod completions;
pub mod config;
pub mod courses;
pub mod error;
pub mod model;
pub mod posts;
pub mod store;
pub mod users;
pub mod validate;
