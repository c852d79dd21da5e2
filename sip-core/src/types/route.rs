//! Route / Record-Route header entries (`spec.md` §3 "Route set", §4.6
//! "Route preprocessing").

use std::fmt;

use crate::types::user_field::UserField;

/// A single Route or Record-Route entry. A route is a *loose* router
/// (RFC 3261 §16.4) iff its URI parameters contain `lr`; otherwise it is a
/// strict router and the preprocessing in `spec.md` §4.6 rewrites the
/// request-URI around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route(pub UserField);

impl Route {
    pub fn new(uf: UserField) -> Self {
        Route(uf)
    }

    pub fn is_loose(&self) -> bool {
        self.0.is_loose_route()
    }

    pub fn user_field(&self) -> &UserField {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered sequence of Route entries, stored top-first (the next hop is
/// always index 0).
pub type RouteSet = Vec<Route>;
