//! Per-user "what am I waiting for next" slots.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::domain::{ChannelId, MessageId, QuestionId, UserId};

/// Multi-step operations that wait for one free-form message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GrantRole,
    RevokeRole,
    CreateQuestion,
    CreateAnswers,
    ReplaceAnswers,
    SetImage,
    RenameQuestion,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::GrantRole => "grant_role",
            OperationKind::RevokeRole => "revoke_role",
            OperationKind::CreateQuestion => "create_question",
            OperationKind::CreateAnswers => "create_answers",
            OperationKind::ReplaceAnswers => "replace_answers",
            OperationKind::SetImage => "set_image",
            OperationKind::RenameQuestion => "rename_question",
        }
    }

    pub fn is_role_change(self) -> bool {
        matches!(self, OperationKind::GrantRole | OperationKind::RevokeRole)
    }

    pub fn expects_photo(self) -> bool {
        matches!(self, OperationKind::SetImage)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub question_id: Option<QuestionId>,
    pub channel_id: Option<ChannelId>,
    /// Transient message asking the user for input.
    pub prompt: MessageId,
    /// Menu message that was active when the prompt was issued.
    pub origin: MessageId,
    pub opened_at: Instant,
}

impl PendingOperation {
    pub fn new(kind: OperationKind, prompt: MessageId, origin: MessageId) -> Self {
        Self {
            kind,
            question_id: None,
            channel_id: None,
            prompt,
            origin,
            opened_at: Instant::now(),
        }
    }

    pub fn for_question(mut self, question_id: QuestionId) -> Self {
        self.question_id = Some(question_id);
        self
    }

    pub fn for_channel(mut self, channel_id: ChannelId) -> Self {
        self.channel_id = Some(channel_id);
        self
    }
}

/// Single slot per user. Shared by every task handling inbound events.
///
/// Setting a slot replaces whatever was there (last write wins). `take` is the
/// only way a slot gets consumed, and of two concurrent callers exactly one
/// observes it. Nothing here survives a restart.
#[derive(Debug, Default)]
pub struct PendingStore {
    slots: DashMap<UserId, PendingOperation>,
    ttl: Option<Duration>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots older than `ttl` are treated as absent and dropped when touched.
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            slots: DashMap::new(),
            ttl: ttl.filter(|d| !d.is_zero()),
        }
    }

    pub fn set(&self, user: UserId, op: PendingOperation) {
        if let Some(prev) = self.slots.insert(user, op) {
            tracing::debug!(
                user = user.0,
                kind = prev.kind.as_str(),
                "replaced unfinished pending operation"
            );
        }
    }

    pub fn read(&self, user: UserId) -> Option<PendingOperation> {
        self.read_at(user, Instant::now())
    }

    pub fn read_at(&self, user: UserId, now: Instant) -> Option<PendingOperation> {
        let op = self.slots.get(&user).map(|r| r.value().clone())?;
        if self.is_expired(&op, now) {
            self.slots
                .remove_if(&user, |_, cur| self.is_expired(cur, now));
            return None;
        }
        Some(op)
    }

    pub fn delete(&self, user: UserId) {
        self.slots.remove(&user);
    }

    /// Atomic read-and-delete.
    pub fn take(&self, user: UserId) -> Option<PendingOperation> {
        self.take_at(user, Instant::now())
    }

    pub fn take_at(&self, user: UserId, now: Instant) -> Option<PendingOperation> {
        let (_, op) = self.slots.remove(&user)?;
        if self.is_expired(&op, now) {
            tracing::debug!(
                user = user.0,
                kind = op.kind.as_str(),
                "dropped expired pending operation"
            );
            return None;
        }
        Some(op)
    }

    /// Like `take`, but leaves the slot alone unless `pred` accepts it.
    pub fn take_if(
        &self,
        user: UserId,
        pred: impl FnOnce(&PendingOperation) -> bool,
    ) -> Option<PendingOperation> {
        let now = Instant::now();
        let (_, op) = self.slots.remove_if(&user, |_, op| pred(op))?;
        if self.is_expired(&op, now) {
            return None;
        }
        Some(op)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn is_expired(&self, op: &PendingOperation, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(op.opened_at) >= ttl,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn op(kind: OperationKind) -> PendingOperation {
        PendingOperation::new(kind, MessageId(10), MessageId(9))
    }

    #[test]
    fn set_then_read_returns_operation() {
        let store = PendingStore::new();
        let u = UserId(1);
        let want = op(OperationKind::CreateQuestion).for_channel(ChannelId(7));
        store.set(u, want.clone());

        assert_eq!(store.read(u), Some(want.clone()));
        // Reading does not consume.
        assert_eq!(store.read(u), Some(want));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = PendingStore::new();
        let u = UserId(1);
        store.set(u, op(OperationKind::GrantRole));
        store.delete(u);
        store.delete(u);
        assert_eq!(store.read(u), None);
        assert!(store.is_empty());
    }

    #[test]
    fn last_write_wins() {
        let store = PendingStore::new();
        let u = UserId(1);
        store.set(u, op(OperationKind::GrantRole));
        store.set(u, op(OperationKind::SetImage).for_question(QuestionId(3)));

        let got = store.take(u).unwrap();
        assert_eq!(got.kind, OperationKind::SetImage);
        assert_eq!(got.question_id, Some(QuestionId(3)));
        assert_eq!(store.take(u), None);
    }

    #[test]
    fn slots_are_keyed_per_user() {
        let store = PendingStore::new();
        store.set(UserId(1), op(OperationKind::GrantRole));
        store.set(UserId(2), op(OperationKind::RevokeRole));

        assert_eq!(store.take(UserId(1)).unwrap().kind, OperationKind::GrantRole);
        assert_eq!(store.read(UserId(2)).unwrap().kind, OperationKind::RevokeRole);
    }

    #[test]
    fn ttl_expires_slots() {
        let store = PendingStore::with_ttl(Some(Duration::from_secs(60)));
        let u = UserId(1);
        let opened = op(OperationKind::RenameQuestion);
        let t0 = opened.opened_at;
        store.set(u, opened);

        assert!(store.read_at(u, t0 + Duration::from_secs(30)).is_some());
        assert!(store.read_at(u, t0 + Duration::from_secs(61)).is_none());
        assert!(store.is_empty());

        store.set(u, op(OperationKind::RenameQuestion));
        let later = Instant::now() + Duration::from_secs(120);
        assert!(store.take_at(u, later).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn zero_ttl_means_no_expiry() {
        let store = PendingStore::with_ttl(Some(Duration::ZERO));
        let u = UserId(1);
        store.set(u, op(OperationKind::GrantRole));
        let far = Instant::now() + Duration::from_secs(86_400);
        assert!(store.take_at(u, far).is_some());
    }

    #[test]
    fn take_if_leaves_a_rejected_slot_in_place() {
        let store = PendingStore::new();
        let u = UserId(1);
        store.set(u, op(OperationKind::SetImage));

        assert!(store.take_if(u, |op| op.prompt == MessageId(11)).is_none());
        assert!(store.read(u).is_some());

        let taken = store.take_if(u, |op| op.prompt == MessageId(10)).unwrap();
        assert_eq!(taken.kind, OperationKind::SetImage);
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_take_has_single_winner() {
        for _ in 0..50 {
            let store = Arc::new(PendingStore::new());
            let u = UserId(42);
            store.set(u, op(OperationKind::CreateQuestion));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    std::thread::spawn(move || store.take(u).is_some())
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }
}
