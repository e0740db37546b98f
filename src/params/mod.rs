//! Transform parameter model.
//!
//! - [`codec`]: decodes `basename[,k_v]*.ext` filenames into tokens and
//!   encodes resolved fields back into canonical filenames
//! - [`resolver`]: applies group configuration (bounds, allow lists, defaults,
//!   disabled operations) to produce a normalized [`TransformSpec`]
//! - [`spec`]: the typed field values

pub mod codec;
pub mod resolver;
pub mod spec;

pub use codec::{decode, encode, DecodedName, Token};
pub use resolver::{Bounds, ParameterResolver};
pub use spec::{Crop, Field, Filter, Gravity, TransformSpec};
