use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::SlotClaim;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Coach { teams: Vec<Ulid> },
    Member,
}

/// Who is acting, and on which day. Built by the caller once per request/session
/// and passed by reference into anything that checks permissions or dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub member_id: Ulid,
    pub role: Role,
    pub today: NaiveDate,
}

impl Session {
    pub fn new(member_id: Ulid, role: Role, today: NaiveDate) -> Self {
        Self { member_id, role, today }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    pub fn coaches(&self, team: Ulid) -> bool {
        matches!(&self.role, Role::Coach { teams } if teams.contains(&team))
    }

    pub fn can_claim_for(&self, team: Ulid) -> bool {
        self.is_admin() || self.coaches(team)
    }

    pub fn can_release(&self, claim: &SlotClaim) -> bool {
        self.is_admin() || self.coaches(claim.claimed_by_team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        "2024-11-01".parse().unwrap()
    }

    #[test]
    fn admin_can_claim_for_any_team() {
        let s = Session::new(Ulid::new(), Role::Admin, today());
        assert!(s.can_claim_for(Ulid::new()));
    }

    #[test]
    fn coach_limited_to_own_teams() {
        let mine = Ulid::new();
        let s = Session::new(Ulid::new(), Role::Coach { teams: vec![mine] }, today());
        assert!(s.can_claim_for(mine));
        assert!(!s.can_claim_for(Ulid::new()));
        assert!(!s.is_admin());
    }

    #[test]
    fn member_cannot_claim() {
        let s = Session::new(Ulid::new(), Role::Member, today());
        assert!(!s.can_claim_for(Ulid::new()));
    }
}
