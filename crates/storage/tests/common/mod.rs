pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{can_bind_localhost, seeded_blob, seeded_bytes};
