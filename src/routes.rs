// src/routes.rs
use crate::stores::SessionPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Signup,
    Home,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::Home => "/home",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(&'static str),
    /// The session is still being restored; decide once it settles.
    Wait,
}

pub fn resolve(path: &str, phase: SessionPhase) -> Navigation {
    let path = match path.trim().trim_end_matches('/') {
        "" => "/",
        p => p,
    };

    match path {
        "/login" => Navigation::Render(Route::Login),
        "/signup" => Navigation::Render(Route::Signup),
        "/home" => match phase {
            SessionPhase::Authenticated => Navigation::Render(Route::Home),
            SessionPhase::Hydrating => Navigation::Wait,
            SessionPhase::Anonymous => Navigation::Redirect(Route::Login.path()),
        },
        _ => Navigation::Redirect(Route::Login.path()),
    }
}

/// Follows redirects to the route that ends up rendered.
pub fn navigate(path: &str, phase: SessionPhase) -> Option<Route> {
    let mut current = path;
    // Every redirect lands on a public route, so this settles quickly.
    for _ in 0..4 {
        match resolve(current, phase) {
            Navigation::Render(route) => return Some(route),
            Navigation::Redirect(next) => current = next,
            Navigation::Wait => return None,
        }
    }
    None
}
