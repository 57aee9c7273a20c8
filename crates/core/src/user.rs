//! User identity model: account, role and rank.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::id::UserId;

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Access role attached to an account.
///
/// The set is closed: route access and service gating are declared against
/// these four values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Officer,
    Soldier,
    /// Default role for fresh registrations.
    #[default]
    Personnel,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Officer, Role::Soldier, Role::Personnel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Officer => "officer",
            Role::Soldier => "soldier",
            Role::Personnel => "personnel",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "officer" => Ok(Role::Officer),
            "soldier" => Ok(Role::Soldier),
            "personnel" => Ok(Role::Personnel),
            other => Err(ApiError::validation(
                "role",
                format!("unknown role: {other}"),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rank
// ─────────────────────────────────────────────────────────────────────────────

/// Military rank, most senior first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    General,
    Colonel,
    Major,
    Captain,
    Lieutenant,
    Sergeant,
    Corporal,
    Private,
}

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::General => "general",
            Rank::Colonel => "colonel",
            Rank::Major => "major",
            Rank::Captain => "captain",
            Rank::Lieutenant => "lieutenant",
            Rank::Sergeant => "sergeant",
            Rank::Corporal => "corporal",
            Rank::Private => "private",
        }
    }
}

impl core::fmt::Display for Rank {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "general" => Ok(Rank::General),
            "colonel" => Ok(Rank::Colonel),
            "major" => Ok(Rank::Major),
            "captain" => Ok(Rank::Captain),
            "lieutenant" => Ok(Rank::Lieutenant),
            "sergeant" => Ok(Rank::Sergeant),
            "corporal" => Ok(Rank::Corporal),
            "private" => Ok(Rank::Private),
            other => Err(ApiError::validation(
                "rank",
                format!("unknown rank: {other}"),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticated account identity.
///
/// Owned by the session layer: feature services read it but only successful
/// auth operations or explicit profile updates replace it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub rank: Option<Rank>,
    pub military_id: Option<String>,
    pub unit: Option<String>,
    pub phone: Option<String>,
    /// Whether the account's email has been confirmed.
    pub verified: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration / profile updates
// ─────────────────────────────────────────────────────────────────────────────

/// Payload for a new account registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub military_id: Option<String>,
    pub rank: Option<Rank>,
    pub unit: Option<String>,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub unit: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.unit.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soldier() -> User {
        User {
            id: UserId::new(),
            email: "j.doe@mil.example".into(),
            first_name: "Jordan".into(),
            last_name: "Doe".into(),
            role: Role::Soldier,
            rank: Some(Rank::Sergeant),
            military_id: Some("MIL-4821".into()),
            unit: Some("3rd Battalion".into()),
            phone: None,
            verified: true,
            created_at: None,
        }
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"officer\"").unwrap(),
            Role::Officer
        );
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("commander".parse::<Role>().is_err());
    }

    #[test]
    fn rank_parsing_is_case_insensitive() {
        assert_eq!("Sergeant".parse::<Rank>().unwrap(), Rank::Sergeant);
        assert!("cadet".parse::<Rank>().is_err());
    }

    #[test]
    fn default_role_is_personnel() {
        assert_eq!(Role::default(), Role::Personnel);
    }

    #[test]
    fn full_name_joins_first_and_last() {
        assert_eq!(soldier().full_name(), "Jordan Doe");
    }

    #[test]
    fn user_round_trips_through_json() {
        let user = soldier();
        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(serde_json::from_str::<User>(&json).unwrap(), user);
    }
}
