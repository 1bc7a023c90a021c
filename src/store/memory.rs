use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::*;
use crate::notify::{ChangeAction, ChangeEvent, Collection, NotifyHub};

use super::{RecordStore, StoreError};

/// Seed data for a `MemoryStore`, read from JSON at daemon startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub halls: Vec<Hall>,
    pub templates: Vec<SlotTemplate>,
    pub trainings: Vec<TrainingInstance>,
    pub games: Vec<Game>,
    pub hall_events: Vec<HallEvent>,
    pub closures: Vec<HallClosure>,
    pub claims: Vec<SlotClaim>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("reading snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-process record store. Every write notifies the hub.
pub struct MemoryStore {
    halls: DashMap<Ulid, Hall>,
    templates: DashMap<Ulid, SlotTemplate>,
    trainings: DashMap<Ulid, TrainingInstance>,
    games: DashMap<Ulid, Game>,
    hall_events: DashMap<Ulid, HallEvent>,
    closures: DashMap<Ulid, HallClosure>,
    claims: DashMap<Ulid, SlotClaim>,
    /// (hall_slot, date) → id of the one active claim on that key.
    active_claims: DashMap<(Ulid, NaiveDate), Ulid>,
    notify: Arc<NotifyHub>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted<T: Clone>(map: &DashMap<Ulid, T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    let mut hits: Vec<(Ulid, T)> = map
        .iter()
        .filter(|e| keep(e.value()))
        .map(|e| (*e.key(), e.value().clone()))
        .collect();
    hits.sort_by_key(|(id, _)| *id);
    hits.into_iter().map(|(_, v)| v).collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            halls: DashMap::new(),
            templates: DashMap::new(),
            trainings: DashMap::new(),
            games: DashMap::new(),
            hall_events: DashMap::new(),
            closures: DashMap::new(),
            claims: DashMap::new(),
            active_claims: DashMap::new(),
            notify: Arc::new(NotifyHub::new()),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for hall in snapshot.halls {
            store.insert_hall(hall);
        }
        for template in snapshot.templates {
            store.insert_template(template);
        }
        for training in snapshot.trainings {
            store.insert_training(training);
        }
        for game in snapshot.games {
            store.insert_game(game);
        }
        for event in snapshot.hall_events {
            store.insert_hall_event(event);
        }
        for closure in snapshot.closures {
            store.insert_closure(closure);
        }
        for claim in snapshot.claims {
            store.insert_claim(claim);
        }
        store
    }

    pub fn load_snapshot(path: &Path) -> Result<Self, SnapshotError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            halls: sorted(&self.halls, |_| true),
            templates: sorted(&self.templates, |_| true),
            trainings: sorted(&self.trainings, |_| true),
            games: sorted(&self.games, |_| true),
            hall_events: sorted(&self.hall_events, |_| true),
            closures: sorted(&self.closures, |_| true),
            claims: sorted(&self.claims, |_| true),
        }
    }

    pub fn notify_hub(&self) -> Arc<NotifyHub> {
        self.notify.clone()
    }

    fn changed(&self, collection: Collection, action: ChangeAction, id: Ulid) {
        self.notify.send(collection, action, id);
    }

    // ── Seeding (CRUD-side writes) ───────────────────────────

    pub fn insert_hall(&self, hall: Hall) {
        self.halls.insert(hall.id, hall);
    }

    pub fn insert_template(&self, template: SlotTemplate) {
        let id = template.id;
        let action = match self.templates.insert(id, template) {
            Some(_) => ChangeAction::Updated,
            None => ChangeAction::Created,
        };
        self.changed(Collection::Templates, action, id);
    }

    pub fn remove_template(&self, id: Ulid) -> Option<SlotTemplate> {
        let (_, removed) = self.templates.remove(&id)?;
        self.changed(Collection::Templates, ChangeAction::Deleted, id);
        Some(removed)
    }

    pub fn insert_training(&self, training: TrainingInstance) {
        let id = training.id;
        let action = match self.trainings.insert(id, training) {
            Some(_) => ChangeAction::Updated,
            None => ChangeAction::Created,
        };
        self.changed(Collection::Trainings, action, id);
    }

    pub fn insert_game(&self, game: Game) {
        let id = game.id;
        let action = match self.games.insert(id, game) {
            Some(_) => ChangeAction::Updated,
            None => ChangeAction::Created,
        };
        self.changed(Collection::Games, action, id);
    }

    pub fn insert_hall_event(&self, event: HallEvent) {
        let id = event.id;
        let action = match self.hall_events.insert(id, event) {
            Some(_) => ChangeAction::Updated,
            None => ChangeAction::Created,
        };
        self.changed(Collection::HallEvents, action, id);
    }

    pub fn insert_closure(&self, closure: HallClosure) {
        let id = closure.id;
        let action = match self.closures.insert(id, closure) {
            Some(_) => ChangeAction::Updated,
            None => ChangeAction::Created,
        };
        self.changed(Collection::Closures, action, id);
    }

    pub fn remove_closure(&self, id: Ulid) -> Option<HallClosure> {
        let (_, removed) = self.closures.remove(&id)?;
        self.changed(Collection::Closures, ChangeAction::Deleted, id);
        Some(removed)
    }

    /// Restore a claim record as-is. An active claim takes over its key in the index.
    pub fn insert_claim(&self, claim: SlotClaim) {
        let id = claim.id;
        if claim.is_active() {
            self.active_claims.insert(claim.key(), id);
        }
        self.claims.insert(id, claim);
        self.changed(Collection::Claims, ChangeAction::Created, id);
    }

    pub fn active_claim_count(&self) -> usize {
        self.active_claims.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn halls(&self) -> Result<Vec<Hall>, StoreError> {
        let mut halls = sorted(&self.halls, |_| true);
        halls.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(halls)
    }

    async fn templates(&self, range: DateRange) -> Result<Vec<SlotTemplate>, StoreError> {
        Ok(sorted(&self.templates, |t| range.admits_validity(&t.validity)))
    }

    async fn trainings(&self, range: DateRange) -> Result<Vec<TrainingInstance>, StoreError> {
        Ok(sorted(&self.trainings, |t| range.contains(t.date)))
    }

    async fn games(&self, range: DateRange) -> Result<Vec<Game>, StoreError> {
        Ok(sorted(&self.games, |g| range.contains(g.date)))
    }

    async fn hall_events(&self, range: DateRange) -> Result<Vec<HallEvent>, StoreError> {
        Ok(sorted(&self.hall_events, |e| range.contains(e.date)))
    }

    async fn closures(&self, range: DateRange) -> Result<Vec<HallClosure>, StoreError> {
        Ok(sorted(&self.closures, |c| range.admits_span(c.start_date, c.end_date)))
    }

    async fn claims(&self, range: DateRange) -> Result<Vec<SlotClaim>, StoreError> {
        Ok(sorted(&self.claims, |c| range.contains(c.date)))
    }

    async fn create_training(&self, training: TrainingInstance) -> Result<TrainingInstance, StoreError> {
        let id = training.id;
        self.trainings.insert(id, training.clone());
        self.changed(Collection::Trainings, ChangeAction::Created, id);
        Ok(training)
    }

    async fn update_training(&self, training: TrainingInstance) -> Result<TrainingInstance, StoreError> {
        let id = training.id;
        {
            let mut existing = self.trainings.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            *existing = training.clone();
        }
        self.changed(Collection::Trainings, ChangeAction::Updated, id);
        Ok(training)
    }

    async fn delete_training(&self, id: Ulid) -> Result<(), StoreError> {
        self.trainings.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.changed(Collection::Trainings, ChangeAction::Deleted, id);
        Ok(())
    }

    async fn create_claim(&self, claim: NewClaim) -> Result<SlotClaim, StoreError> {
        let key = (claim.hall_slot, claim.date);
        let record = match self.active_claims.entry(key) {
            Entry::Occupied(_) => {
                return Err(StoreError::UniqueViolation { hall_slot: claim.hall_slot, date: claim.date });
            }
            Entry::Vacant(vacant) => {
                let record = SlotClaim {
                    id: Ulid::new(),
                    hall_slot: claim.hall_slot,
                    hall_id: claim.hall_id,
                    date: claim.date,
                    time: claim.time,
                    claimed_by_team: claim.claimed_by_team,
                    claimed_by_member: claim.claimed_by_member,
                    freed_reason: claim.freed_reason,
                    freed_source_id: claim.freed_source_id,
                    status: ClaimStatus::Active,
                    notes: claim.notes,
                    created_at: Utc::now(),
                    revoked_at: None,
                    revoked_by: None,
                };
                // Record first, so a reader that sees the index entry finds the claim.
                self.claims.insert(record.id, record.clone());
                vacant.insert(record.id);
                record
            }
        };
        self.changed(Collection::Claims, ChangeAction::Created, record.id);
        Ok(record)
    }

    async fn get_claim(&self, id: Ulid) -> Result<SlotClaim, StoreError> {
        self.claims
            .get(&id)
            .map(|c| c.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn revoke_claim(&self, id: Ulid, revoked_by: Ulid) -> Result<SlotClaim, StoreError> {
        let revoked = {
            let mut claim = self.claims.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            if !claim.is_active() {
                return Err(StoreError::NotActive(id));
            }
            claim.status = ClaimStatus::Revoked;
            claim.revoked_at = Some(Utc::now());
            claim.revoked_by = Some(revoked_by);
            claim.clone()
        };
        // Claim guard is dropped: create_claim locks the index before the claims map.
        self.active_claims.remove_if(&revoked.key(), |_, active| *active == id);
        self.changed(Collection::Claims, ChangeAction::Updated, id);
        Ok(revoked)
    }

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent> {
        self.notify.subscribe(collection)
    }
}
