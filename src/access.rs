//! Guards which team data a request may see, based on the user's favorites.

use serde::Serialize;
use thiserror::Error;

/// How the authorized team list was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// The caller asked for specific teams and holds all of them.
    Requested,
    /// No teams were requested; the user's favorites apply.
    Favorites,
    /// No teams requested and no favorites; league-wide overview only.
    Overview,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAccess {
    pub mode: AccessMode,
    pub authorized: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    #[error("not authorized for teams: {}", unauthorized_teams.join(", "))]
    Unauthorized { unauthorized_teams: Vec<String> },
}

impl AccessError {
    /// HTTP status the collaborator boundary maps this to.
    pub fn status_code(&self) -> u16 {
        403
    }
}

/// Resolves which teams a request is allowed to read.
///
/// Requested teams must all be favorites; any stranger in the list rejects
/// the whole request rather than silently narrowing it.
pub fn resolve_team_access(
    favorites: &[String],
    requested: &[String],
) -> Result<TeamAccess, AccessError> {
    if requested.is_empty() {
        if favorites.is_empty() {
            return Ok(TeamAccess {
                mode: AccessMode::Overview,
                authorized: Vec::new(),
            });
        }
        return Ok(TeamAccess {
            mode: AccessMode::Favorites,
            authorized: favorites.to_vec(),
        });
    }

    let unauthorized_teams: Vec<String> = requested
        .iter()
        .filter(|team| !favorites.contains(team))
        .cloned()
        .collect();
    if !unauthorized_teams.is_empty() {
        return Err(AccessError::Unauthorized { unauthorized_teams });
    }

    Ok(TeamAccess {
        mode: AccessMode::Requested,
        authorized: requested.to_vec(),
    })
}
