//! Credential lookup.

/// Environment variables searched for a GitHub token, in order.
pub const TOKEN_VARIABLES: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Read a GitHub token from the environment.
///
/// `GITHUB_TOKEN` takes precedence over `GH_TOKEN`. Empty values are ignored.
#[must_use]
pub fn token_from_env() -> Option<String> {
    TOKEN_VARIABLES.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
