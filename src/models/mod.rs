pub mod candidate;
pub mod dimension;
pub mod field;
pub mod index;
pub mod metric;
pub mod sync;

pub use candidate::*;
pub use dimension::*;
pub use field::*;
pub use index::*;
pub use metric::*;
pub use sync::*;
