pub mod simulated;
pub mod slot;

pub use simulated::SimulatedSensor;
pub use slot::{frame_slot, FrameReader, FrameSnapshot, FrameWriter};
