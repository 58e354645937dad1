//! Host collaborator interfaces.
//!
//! The resolution core never talks to the game directly. It resolves
//! identifiers, reads the world context, and expands leveled lists through
//! these traits. `InMemoryHost` implements all of them for embedding and tests.

mod memory;
mod traits;

pub use memory::InMemoryHost;
pub use traits::{FormResolver, LeveledListEvaluator, ObjectRef, Placement, WorldContextProvider};
