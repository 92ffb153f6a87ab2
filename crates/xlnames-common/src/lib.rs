pub mod coerce;
pub mod compare;
pub mod error;
pub mod locale;
pub mod value;

pub use coerce::*;
pub use compare::*;
pub use error::*;
pub use locale::*;
pub use value::*;
