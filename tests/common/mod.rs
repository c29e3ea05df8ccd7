pub mod harness;

// Re-export commonly used test utilities
pub use harness::{args, first_text, texts, TestHarness};
