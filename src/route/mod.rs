//! Request routing: splits a request URL into group, source and transform
//! components and rebuilds canonical redirect targets.

mod path;

pub use path::{RequestContext, RoutePath};
