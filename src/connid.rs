//! Connection ID issuance and migration bookkeeping, grounded on
//! `original_source/src/modules/connid_gen.c` and `migrate.c`.
//! `path_challenge` issuance is a stub: migration *validation* is out of
//! scope here, so `Migrate::migrate` swaps the destination CID without
//! ever sending/awaiting a `PATH_CHALLENGE`; the frame type itself still
//! encodes/decodes for wire compatibility.

use std::collections::{HashSet, VecDeque};

use rand::RngCore;

use crate::cid::{ConnectionId, IssuedConnectionId};
use crate::error::{require, QuicError, QuicResult};
use crate::frame::{Frame, NewConnectionIdFrame, RetireConnectionIdFrame};

/// Issues and retires the local endpoint's own connection IDs, keeping
/// `active_count` of them outstanding for the peer to address us by.
#[derive(Debug)]
pub struct ConnidGen {
    cid_len: usize,
    active_count: u32,
    next_sequence: u64,
    issued: Vec<IssuedConnectionId>,
    pending: VecDeque<Frame>,
}

impl ConnidGen {
    pub fn new(active_count: u32, cid_len: usize) -> Self {
        let mut gen = Self {
            cid_len,
            active_count,
            next_sequence: 0,
            issued: Vec::new(),
            pending: VecDeque::new(),
        };
        for _ in 0..active_count {
            gen.issue_one();
        }
        gen
    }

    fn issue_one(&mut self) {
        let sequence_number = self.next_sequence;
        self.next_sequence += 1;
        let cid = ConnectionId::random(self.cid_len);
        let mut token = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut token);

        self.pending.push_back(Frame::NewConnectionId(NewConnectionIdFrame {
            sequence_number,
            retire_prior_to: 0,
            connection_id: cid.clone(),
            stateless_reset_token: token,
        }));
        self.issued.push(IssuedConnectionId { sequence_number, cid, stateless_reset_token: token, retired: false });
    }

    /// Drains any `NEW_CONNECTION_ID` frames queued since the last call.
    pub fn take_pending_frames(&mut self) -> Vec<Frame> {
        self.pending.drain(..).collect()
    }

    /// The peer retired one of our CIDs; validate and replace it so the
    /// active count stays topped up.
    pub fn on_retire_connection_id(&mut self, frame: &RetireConnectionIdFrame) -> QuicResult<()> {
        let entry = self
            .issued
            .iter_mut()
            .find(|i| i.sequence_number == frame.sequence_number)
            .ok_or(QuicError::BadFormat("retire_connection_id: unknown sequence number"))?;
        require(!entry.retired, "retire_connection_id: already retired")?;
        entry.retired = true;
        self.issue_one();
        Ok(())
    }

    pub fn active_cids(&self) -> impl Iterator<Item = &IssuedConnectionId> {
        self.issued.iter().filter(|i| !i.retired)
    }

    /// The connection ID we currently expect the peer to address us by:
    /// the oldest still-active one we've issued.
    pub fn current_cid(&self) -> ConnectionId {
        self.active_cids().next().map(|i| i.cid.clone()).unwrap_or_else(|| ConnectionId::random(self.cid_len))
    }
}

/// Tracks connection IDs the peer has offered us to address *them* by, and
/// the stub migration operation of switching to one.
#[derive(Debug)]
pub struct Migrate {
    available: VecDeque<ConnectionId>,
    retired_sequences: HashSet<u64>,
    highest_retire_prior_to: u64,
    pending: VecDeque<Frame>,
    /// `config.disable_migrate`: when set, offered CIDs are still tracked
    /// (retirement bookkeeping is protocol-mandated regardless), but
    /// `migrate` never hands one back.
    disabled: bool,
}

impl Migrate {
    pub fn new(disabled: bool) -> Self {
        Self {
            available: VecDeque::new(),
            retired_sequences: HashSet::new(),
            highest_retire_prior_to: 0,
            pending: VecDeque::new(),
            disabled,
        }
    }

    /// Folds in a `NEW_CONNECTION_ID` from the peer, queuing
    /// `RETIRE_CONNECTION_ID` for any sequence numbers it asks retired.
    pub fn on_new_connection_id(&mut self, frame: &NewConnectionIdFrame) -> QuicResult<()> {
        if frame.retire_prior_to > self.highest_retire_prior_to {
            self.highest_retire_prior_to = frame.retire_prior_to;
        }
        if !self.retired_sequences.contains(&frame.sequence_number) && frame.sequence_number >= self.highest_retire_prior_to {
            self.available.push_back(frame.connection_id.clone());
        }
        for seq in 0..frame.retire_prior_to {
            if self.retired_sequences.insert(seq) {
                self.pending.push_back(Frame::RetireConnectionId(RetireConnectionIdFrame { sequence_number: seq }));
            }
        }
        Ok(())
    }

    pub fn take_pending_frames(&mut self) -> Vec<Frame> {
        self.pending.drain(..).collect()
    }

    /// Stub migration: hands back a spare peer-issued CID to address the
    /// peer by on a new path, without any path validation (non-goal).
    /// Returns `None` if the peer hasn't offered a spare CID, or if
    /// migration is disabled by configuration.
    pub fn migrate(&mut self) -> Option<ConnectionId> {
        if self.disabled {
            return None;
        }
        self.available.pop_front()
    }

    pub fn has_spare_cid(&self) -> bool {
        !self.disabled && !self.available.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_active_count_cids_up_front() {
        let mut gen = ConnidGen::new(3, 8);
        let frames = gen.take_pending_frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(gen.active_cids().count(), 3);
    }

    #[test]
    fn retiring_one_issues_a_replacement() {
        let mut gen = ConnidGen::new(2, 8);
        gen.take_pending_frames();
        gen.on_retire_connection_id(&RetireConnectionIdFrame { sequence_number: 0 }).unwrap();
        assert_eq!(gen.active_cids().count(), 2);
        assert_eq!(gen.take_pending_frames().len(), 1);
    }

    #[test]
    fn unknown_sequence_number_is_rejected() {
        let mut gen = ConnidGen::new(1, 8);
        assert!(gen.on_retire_connection_id(&RetireConnectionIdFrame { sequence_number: 99 }).is_err());
    }

    #[test]
    fn migrate_hands_back_a_spare_peer_cid() {
        let mut migrate = Migrate::new(false);
        assert!(migrate.migrate().is_none());
        migrate
            .on_new_connection_id(&NewConnectionIdFrame {
                sequence_number: 0,
                retire_prior_to: 0,
                connection_id: ConnectionId::new(vec![1; 8]).unwrap(),
                stateless_reset_token: [0; 16],
            })
            .unwrap();
        assert!(migrate.has_spare_cid());
        assert!(migrate.migrate().is_some());
        assert!(!migrate.has_spare_cid());
    }

    #[test]
    fn retire_prior_to_queues_retirements() {
        let mut migrate = Migrate::new(false);
        migrate
            .on_new_connection_id(&NewConnectionIdFrame {
                sequence_number: 2,
                retire_prior_to: 2,
                connection_id: ConnectionId::new(vec![2; 8]).unwrap(),
                stateless_reset_token: [0; 16],
            })
            .unwrap();
        let pending = migrate.take_pending_frames();
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn disabled_migration_never_hands_back_a_cid() {
        let mut migrate = Migrate::new(true);
        migrate
            .on_new_connection_id(&NewConnectionIdFrame {
                sequence_number: 0,
                retire_prior_to: 0,
                connection_id: ConnectionId::new(vec![1; 8]).unwrap(),
                stateless_reset_token: [0; 16],
            })
            .unwrap();
        assert!(!migrate.has_spare_cid());
        assert!(migrate.migrate().is_none());
    }
}
