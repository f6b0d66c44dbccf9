//! Four-tier memory system
//!
//! Short-term (recent turns), episodic (user goals), procedural (learned tool
//! sequences), and semantic (verified health facts), coordinated behind a
//! single fan-out read/write facade.

pub mod coordinator;
pub mod episodic;
pub mod knowledge;
pub mod procedural;
pub mod semantic;
pub mod short_term;
pub mod types;

pub use coordinator::{FullContext, MemoryCoordinator, MemoryStats, QueueSnapshot, StoreOutcome};
pub use episodic::EpisodicStore;
pub use procedural::ProceduralStore;
pub use semantic::SemanticStore;
pub use short_term::ShortTermStore;
