pub mod candidate;
pub mod errors;
pub mod value;

pub use candidate::*;
pub use errors::*;
pub use value::*;
