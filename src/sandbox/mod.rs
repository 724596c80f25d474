pub mod context;
pub mod driver;
pub mod meta;

pub use context::RunContext;
pub use driver::{allocate_slot, Driver, MaterialSystem, RunOutput, System};
pub use meta::Meta;
