//! castkit Episode Model
//!
//! Defines the core data contracts for episode assembly:
//! - **Segments:** Ordered timeline items, either freshly recorded clips or
//!   references to reusable library assets
//! - **Episodes / Podcasts:** Publication state and render settings
//! - **Store:** Keyed read/write persistence port with in-memory and JSON-file
//!   implementations
//!
//! Audio paths are stored relative to the data root and only become usable
//! file paths after being validated as a `SandboxedPath`.

pub mod episode;
pub mod ids;
pub mod segment;
pub mod store;

pub use episode::*;
pub use ids::*;
pub use segment::*;
pub use store::*;
