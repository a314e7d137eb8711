//! Screens and navigation history.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A screen of the client, addressable by path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/`
    Feed,
    /// `/posts/:id`
    PostDetail(String),
    /// `/bookmarks`
    Bookmarks,
    /// `/wallet`
    Wallet,
    /// `/admin/users`
    AdminUsers,
    /// `/admin/tags`
    AdminTags,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no screen at {0:?}")]
pub struct UnknownRoute(pub String);

impl Route {
    pub fn path(&self) -> String {
        match self {
            Self::Feed => "/".to_string(),
            Self::PostDetail(id) => format!("/posts/{id}"),
            Self::Bookmarks => "/bookmarks".to_string(),
            Self::Wallet => "/wallet".to_string(),
            Self::AdminUsers => "/admin/users".to_string(),
            Self::AdminTags => "/admin/tags".to_string(),
        }
    }

    pub const fn title(&self) -> &'static str {
        match self {
            Self::Feed => "Feed",
            Self::PostDetail(_) => "Post",
            Self::Bookmarks => "Bookmarks",
            Self::Wallet => "Wallet",
            Self::AdminUsers => "Users",
            Self::AdminTags => "Tags & topics",
        }
    }

    /// Admin console screens.
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::AdminUsers | Self::AdminTags)
    }
}

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let trimmed = path.trim().trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').skip(1).collect();
        match segments.as_slice() {
            [] | [""] => Ok(Self::Feed),
            ["posts", id] if !id.is_empty() => Ok(Self::PostDetail((*id).to_string())),
            ["bookmarks"] => Ok(Self::Bookmarks),
            ["wallet"] => Ok(Self::Wallet),
            ["admin", "users"] => Ok(Self::AdminUsers),
            ["admin", "tags"] => Ok(Self::AdminTags),
            _ => Err(UnknownRoute(path.to_string())),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// The current screen plus the screens to go back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router {
    current: Route,
    history: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(Route::Feed)
    }
}

impl Router {
    pub const fn new(start: Route) -> Self {
        Self {
            current: start,
            history: Vec::new(),
        }
    }

    pub const fn current(&self) -> &Route {
        &self.current
    }

    /// Opens `route`. Opening the current screen again does nothing.
    pub fn push(&mut self, route: Route) {
        if route != self.current {
            let previous = std::mem::replace(&mut self.current, route);
            self.history.push(previous);
        }
    }

    /// Replaces the current screen without recording it in the history.
    pub fn replace(&mut self, route: Route) {
        self.current = route;
    }

    /// Returns to the previous screen. Returns `false` at the first screen.
    pub fn back(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_round_trip() {
        let routes = [
            Route::Feed,
            Route::PostDetail("p-42".into()),
            Route::Bookmarks,
            Route::Wallet,
            Route::AdminUsers,
            Route::AdminTags,
        ];
        for route in routes {
            assert_eq!(route.path().parse::<Route>(), Ok(route));
        }
    }

    #[test]
    fn test_parse_tolerates_trailing_slash() {
        assert_eq!("/wallet/".parse::<Route>(), Ok(Route::Wallet));
        assert_eq!("".parse::<Route>(), Ok(Route::Feed));
    }

    #[test]
    fn test_parse_rejects_unknown_paths() {
        assert!("/posts".parse::<Route>().is_err());
        assert!("/posts/1/edit".parse::<Route>().is_err());
        assert!("/admin".parse::<Route>().is_err());
        assert_eq!(
            "/nope".parse::<Route>(),
            Err(UnknownRoute("/nope".into()))
        );
    }

    #[test]
    fn test_history() {
        let mut router = Router::default();
        assert!(!router.back());

        router.push(Route::PostDetail("p-1".into()));
        router.push(Route::PostDetail("p-1".into()));
        router.push(Route::Wallet);
        assert_eq!(router.current(), &Route::Wallet);

        assert!(router.back());
        assert_eq!(router.current(), &Route::PostDetail("p-1".into()));
        assert!(router.back());
        assert_eq!(router.current(), &Route::Feed);
        assert!(!router.can_go_back());
    }

    #[test]
    fn test_replace_skips_history() {
        let mut router = Router::default();
        router.push(Route::PostDetail("p-1".into()));
        router.replace(Route::Feed);
        assert!(router.back());
        assert_eq!(router.current(), &Route::Feed);
    }
}
