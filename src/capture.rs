pub mod encoder;
pub mod listener;
pub mod registry;
pub mod rotation;
pub mod supervisor;
pub mod types;
