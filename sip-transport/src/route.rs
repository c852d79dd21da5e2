//! Route/Record-Route preprocessing (`spec.md` §4.6 "Route preprocessing",
//! RFC 3261 §12.2.1.1/§16.4).
//!
//! Run once per outbound request, before channel selection: it decides
//! whether the request-URI needs rewriting around a strict router and
//! leaves the route set in the shape that determines the next-hop target.

use sip_core::prelude::{Request, Route, Uri, UserField};

/// Rewrites `request`'s request-URI and Route set per the four numbered
/// steps in `spec.md` §4.6. `is_local_channel` answers "does this Route's
/// URI address one of our own listening channels" — used only by steps 2
/// and 3, which apply when this stack is itself a Route target (acting as
/// a proxy), not when it is the originating UAC forwarding to an upstream
/// router.
///
/// Returns the "received route" remembered in step 3, if any.
pub fn preprocess_route(request: &mut Request, is_local_channel: &dyn Fn(&Uri) -> bool) -> Option<Route> {
    if request.headers.routes.is_empty() {
        return None;
    }

    // Step 2: the previous hop was a strict router that populated our
    // request-URI with what should have been the bottom Route.
    if request.request_uri.is_loose_route() && is_local_channel(&request.request_uri) {
        if let Some(bottom) = request.headers.routes.pop() {
            request.request_uri = bottom.user_field().uri.clone();
        }
    }

    // Step 3: pop a top Route that names one of our own channels.
    let received_route = match request.headers.routes.first() {
        Some(top) if is_local_channel(&top.user_field().uri) => Some(request.headers.routes.remove(0)),
        _ => None,
    };

    // Step 4: a strict-router top Route gets popped into the request-URI,
    // and the request-URI it displaces is pushed onto the bottom so the
    // strict router can restore it once it has forwarded past itself.
    if let Some(top) = request.headers.routes.first() {
        if !top.is_loose() {
            let strict = request.headers.routes.remove(0);
            let displaced = std::mem::replace(&mut request.request_uri, strict.user_field().uri.clone());
            request.headers.routes.push(Route::new(UserField::new(displaced)));
        }
    }

    received_route
}

/// The next-hop target once Route preprocessing has run: the top Route's
/// URI if one remains, else the (possibly rewritten) request-URI itself.
pub fn next_hop_uri(request: &Request) -> &Uri {
    match request.headers.routes.first() {
        Some(route) => &route.user_field().uri,
        None => &request.request_uri,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_core::prelude::Method;

    fn route(uri: &str) -> Route {
        Route::new(UserField::new(uri.parse().unwrap()))
    }

    fn request_to(uri: &str) -> Request {
        Request::new(Method::Invite, uri.parse().unwrap())
    }

    fn never_local(_: &Uri) -> bool {
        false
    }

    #[test]
    fn empty_route_set_is_a_noop() {
        let mut request = request_to("sip:alice@atlanta.example");
        assert!(preprocess_route(&mut request, &never_local).is_none());
        assert_eq!(request.request_uri.to_string(), "sip:alice@atlanta.example");
    }

    #[test]
    fn loose_router_leaves_request_uri_untouched() {
        let mut request = request_to("sip:alice@atlanta.example");
        request.headers.routes = vec![route("sip:p1.example;lr"), route("sip:p2.example")];

        preprocess_route(&mut request, &never_local);

        assert_eq!(request.request_uri.to_string(), "sip:alice@atlanta.example");
        assert_eq!(next_hop_uri(&request).to_string(), "sip:p1.example;lr");
        assert_eq!(request.headers.routes.len(), 2);
    }

    #[test]
    fn strict_router_rewrites_request_uri_and_pushes_original_to_bottom() {
        let mut request = request_to("sip:alice@atlanta.example");
        request.headers.routes = vec![route("sip:p1.example"), route("sip:p2.example")];

        preprocess_route(&mut request, &never_local);

        assert_eq!(request.request_uri.to_string(), "sip:p1.example");
        assert_eq!(request.headers.routes.len(), 2);
        assert_eq!(request.headers.routes[0].user_field().uri.to_string(), "sip:p2.example");
        assert_eq!(request.headers.routes[1].user_field().uri.to_string(), "sip:alice@atlanta.example");
    }

    #[test]
    fn top_route_matching_a_local_channel_is_popped_and_remembered() {
        let mut request = request_to("sip:alice@atlanta.example");
        request.headers.routes = vec![route("sip:proxy.local;lr"), route("sip:p2.example")];

        let received = preprocess_route(&mut request, &|uri| uri.to_string().starts_with("sip:proxy.local"));

        assert!(received.is_some());
        assert_eq!(request.headers.routes.len(), 1);
        assert_eq!(request.headers.routes[0].user_field().uri.to_string(), "sip:p2.example");
    }
}
