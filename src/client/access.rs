use crate::auth::Role;

pub const LOGIN_PATH: &str = "/login";
/// Where the "access denied" popup sends the user back to.
pub const DENIED_RETURN_PATH: &str = "/dashboard";

/// Whether `role` may open the page at `path`. Staff only see the dashboard and fee pages.
pub fn can_access(role: Role, path: &str) -> bool {
    match role {
        Role::Staff => path == "/" || path == "/dashboard" || path.starts_with("/fees"),
        Role::Admin | Role::Accountant | Role::Viewer => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    NoToken,
    /// Token present but the profile has not loaded yet.
    TokenNoUser,
    TokenAndUserAllowed,
    TokenAndUserDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    RedirectToLogin,
    /// Render optimistically while the profile loads.
    Passthrough,
    Render,
    ShowPopup { return_to: &'static str },
}

impl GateState {
    pub fn evaluate(has_token: bool, role: Option<Role>, path: &str) -> Self {
        match (has_token, role) {
            (false, _) => GateState::NoToken,
            (true, None) => GateState::TokenNoUser,
            (true, Some(role)) if can_access(role, path) => GateState::TokenAndUserAllowed,
            (true, Some(_)) => GateState::TokenAndUserDenied,
        }
    }

    pub fn decision(self) -> GateDecision {
        match self {
            GateState::NoToken => GateDecision::RedirectToLogin,
            GateState::TokenNoUser => GateDecision::Passthrough,
            GateState::TokenAndUserAllowed => GateDecision::Render,
            GateState::TokenAndUserDenied => GateDecision::ShowPopup {
                return_to: DENIED_RETURN_PATH,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_limited_to_dashboard_and_fees() {
        assert!(can_access(Role::Staff, "/fees/anything"));
        assert!(can_access(Role::Staff, "/dashboard"));
        assert!(can_access(Role::Staff, "/"));
        assert!(!can_access(Role::Staff, "/settings/accounts"));
        assert!(!can_access(Role::Staff, "/residents"));
    }

    #[test]
    fn other_roles_go_everywhere() {
        for role in [Role::Admin, Role::Accountant, Role::Viewer] {
            assert!(can_access(role, "/settings/accounts"));
        }
    }

    #[test]
    fn gate_states_map_to_decisions() {
        assert_eq!(
            GateState::evaluate(false, Some(Role::Admin), "/").decision(),
            GateDecision::RedirectToLogin
        );
        assert_eq!(
            GateState::evaluate(true, None, "/settings/accounts").decision(),
            GateDecision::Passthrough
        );
        assert_eq!(
            GateState::evaluate(true, Some(Role::Staff), "/settings/accounts").decision(),
            GateDecision::ShowPopup { return_to: "/dashboard" }
        );
        assert_eq!(
            GateState::evaluate(true, Some(Role::Admin), "/settings/accounts").decision(),
            GateDecision::Render
        );
    }
}
