//! Concrete tasks run by the sequencer

mod state_probe;
mod terraform;

pub use state_probe::StateProbe;
pub use terraform::TerraformTask;
