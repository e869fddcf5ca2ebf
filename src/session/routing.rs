use crate::catalog::EntityKind;

pub const LOGIN_ROUTE: &str = "/login";
/// Where authenticated users land.
pub const DEFAULT_ROUTE: &str = "/products";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

/// Route gate for the console pages. Entity pages need a session; `/login` is only for
/// signed-out users; `/` and unknown paths are redirected.
pub fn route_decision(path: &str, authenticated: bool) -> RouteDecision {
    let path = path.trim_end_matches('/');
    if path == LOGIN_ROUTE {
        return if authenticated {
            RouteDecision::Redirect(DEFAULT_ROUTE)
        } else {
            RouteDecision::Allow
        };
    }
    if !authenticated {
        return RouteDecision::Redirect(LOGIN_ROUTE);
    }
    let is_page = path
        .strip_prefix('/')
        .and_then(EntityKind::from_path_segment)
        .is_some();
    if is_page {
        RouteDecision::Allow
    } else {
        RouteDecision::Redirect(DEFAULT_ROUTE)
    }
}
