use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::MAX_NOTES_LEN;
use crate::model::*;
use crate::observability::{CLAIMS_TOTAL, RELEASES_TOTAL};
use crate::session::Session;
use crate::store::RecordStore;

use super::error::PlanError;
use super::slot::{ClaimState, FreedSlot, VirtualSlot};

fn record_outcome(outcome: &'static str) {
    metrics::counter!(CLAIMS_TOTAL, "outcome" => outcome).increment(1);
}

/// Everything checked before the store sees the claim.
pub fn check_claim(session: &Session, freed: &FreedSlot, team: Ulid, notes: Option<&str>) -> Result<(), PlanError> {
    if !session.can_claim_for(team) {
        return Err(PlanError::Forbidden("only an admin or the team's coach can claim"));
    }
    if freed.date < session.today {
        return Err(PlanError::PastDate(freed.date));
    }
    if notes.is_some_and(|n| n.len() > MAX_NOTES_LEN) {
        return Err(PlanError::LimitExceeded("notes too long"));
    }
    Ok(())
}

/// Claim a freed slot for `team`. The store's uniqueness constraint on
/// (template, date) decides races; the loser gets `PlanError::AlreadyClaimed`.
pub async fn claim_slot<S: RecordStore + ?Sized>(
    store: &S,
    session: &Session,
    slot: &VirtualSlot,
    team: Ulid,
    notes: Option<String>,
) -> Result<SlotClaim, PlanError> {
    let freed = match &slot.claim_state {
        ClaimState::Freed(freed) => freed,
        ClaimState::Claimed { slot, .. } => {
            record_outcome("taken");
            return Err(PlanError::AlreadyClaimed { hall_slot: slot.template_id, date: slot.date });
        }
        ClaimState::Occupied => {
            record_outcome("rejected");
            return Err(PlanError::NotFreed);
        }
    };
    claim_freed(store, session, freed, team, notes).await
}

pub async fn claim_freed<S: RecordStore + ?Sized>(
    store: &S,
    session: &Session,
    freed: &FreedSlot,
    team: Ulid,
    notes: Option<String>,
) -> Result<SlotClaim, PlanError> {
    if let Err(e) = check_claim(session, freed, team, notes.as_deref()) {
        record_outcome("rejected");
        return Err(e);
    }

    let request = NewClaim {
        hall_slot: freed.template_id,
        hall_id: freed.hall_id,
        date: freed.date,
        time: freed.time,
        claimed_by_team: team,
        claimed_by_member: session.member_id,
        freed_reason: freed.reason,
        freed_source_id: freed.source_id,
        notes,
    };
    match store.create_claim(request).await {
        Ok(claim) => {
            record_outcome("created");
            info!(
                "team {team} claimed slot {} on {} (claim {})",
                claim.hall_slot, claim.date, claim.id
            );
            Ok(claim)
        }
        Err(e) => {
            let err = PlanError::from(e);
            if err.is_already_claimed() {
                record_outcome("taken");
                warn!("claim race lost for slot {} on {}", freed.template_id, freed.date);
            } else {
                record_outcome("failed");
                warn!("claim for slot {} on {} failed: {err}", freed.template_id, freed.date);
            }
            Err(err)
        }
    }
}

/// Revoke an active claim. Admins and coaches of the claiming team only.
pub async fn release_claim<S: RecordStore + ?Sized>(
    store: &S,
    session: &Session,
    claim_id: Ulid,
) -> Result<SlotClaim, PlanError> {
    let claim = store.get_claim(claim_id).await?;
    if !session.can_release(&claim) {
        return Err(PlanError::Forbidden("only an admin or the claiming team's coach can release"));
    }
    if !claim.is_active() {
        return Err(PlanError::AlreadyRevoked(claim_id));
    }
    let revoked = store.revoke_claim(claim_id, session.member_id).await?;
    metrics::counter!(RELEASES_TOTAL).increment(1);
    info!(
        "claim {claim_id} on slot {} for {} released by {}",
        revoked.hall_slot, revoked.date, session.member_id
    );
    Ok(revoked)
}
