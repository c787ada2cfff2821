//! Test support: stub collaborators and pipeline fixtures.

mod fixtures;
mod stubs;

pub use fixtures::{Harness, StubSet};
pub use stubs::StubCollaborator;
