//! `nom`-based grammar parsers, one module per production (`spec.md` §4.1-§4.3).

pub mod headers;
pub mod message;
pub mod params;
pub mod uri;
pub mod user_field;
pub mod via;
