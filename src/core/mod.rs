pub mod engine;
pub mod position;
pub mod sizer;
pub mod supervisor;
