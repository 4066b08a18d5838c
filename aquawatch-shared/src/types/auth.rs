use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles issued by the surveillance platform's identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    AshaWorker,
    ClinicStaff,
    DistrictOfficer,
    StateAdmin,
    SystemAdmin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::AshaWorker => write!(f, "asha_worker"),
            UserRole::ClinicStaff => write!(f, "clinic_staff"),
            UserRole::DistrictOfficer => write!(f, "district_officer"),
            UserRole::StateAdmin => write!(f, "state_admin"),
            UserRole::SystemAdmin => write!(f, "system_admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asha_worker" => Ok(UserRole::AshaWorker),
            "clinic_staff" => Ok(UserRole::ClinicStaff),
            "district_officer" => Ok(UserRole::DistrictOfficer),
            "state_admin" => Ok(UserRole::StateAdmin),
            "system_admin" => Ok(UserRole::SystemAdmin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

impl UserRole {
    /// Officers and administrators may acknowledge, resolve and raise alerts.
    pub fn can_manage_alerts(self) -> bool {
        matches!(
            self,
            UserRole::DistrictOfficer | UserRole::StateAdmin | UserRole::SystemAdmin
        )
    }

    pub fn is_admin(self) -> bool {
        matches!(self, UserRole::StateAdmin | UserRole::SystemAdmin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    pub fn new(user_id: Uuid, role: UserRole, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            role,
            iat: now,
            exp: now + duration_secs,
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
    pub token_id: Uuid,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            token_id: claims.jti,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [
            UserRole::AshaWorker,
            UserRole::ClinicStaff,
            UserRole::DistrictOfficer,
            UserRole::StateAdmin,
            UserRole::SystemAdmin,
        ] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert!("field_agent".parse::<UserRole>().is_err());
    }

    #[test]
    fn only_officers_manage_alerts() {
        assert!(!UserRole::AshaWorker.can_manage_alerts());
        assert!(!UserRole::ClinicStaff.can_manage_alerts());
        assert!(UserRole::DistrictOfficer.can_manage_alerts());
        assert!(UserRole::SystemAdmin.can_manage_alerts());
    }

    #[test]
    fn fresh_claims_are_not_expired() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::ClinicStaff, 60);
        assert!(!claims.is_expired());
        assert!(Claims::new(Uuid::new_v4(), UserRole::ClinicStaff, -10).is_expired());
    }
}
