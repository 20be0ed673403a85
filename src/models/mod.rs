pub mod batch;
pub mod record;

pub use batch::*;
pub use record::*;
