pub mod emulator;

// Convenience exports
pub use emulator::Emulator;
