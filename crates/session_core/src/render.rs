//! Renderer contract and pure projections of session state.

use std::collections::HashSet;

use transport::{ParticipantId, UserId};

/// Full view of the session handed to the renderer after every mutation.
/// Carries no provider objects; sets are cloned out of the controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub current_user_id: Option<UserId>,
    pub joined: bool,
    pub published: bool,
    pub participants: HashSet<ParticipantId>,
    pub speakers: HashSet<ParticipantId>,
}

impl SessionSnapshot {
    pub fn empty() -> Self {
        Self {
            current_user_id: None,
            joined: false,
            published: false,
            participants: HashSet::new(),
            speakers: HashSet::new(),
        }
    }

    /// User id as shown in the UI, `-` before join and after leave.
    pub fn user_id_display(&self) -> String {
        match self.current_user_id {
            Some(uid) => uid.to_string(),
            None => "-".to_string(),
        }
    }

    pub fn is_speaking(&self, participant: &ParticipantId) -> bool {
        self.speakers.contains(participant)
    }

    pub fn controls(&self) -> Controls {
        Controls {
            join_enabled: !self.joined,
            publish_enabled: self.joined && !self.published,
            unpublish_enabled: self.joined && self.published,
            leave_enabled: self.joined,
        }
    }
}

/// Enable/disable state of the four session controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub join_enabled: bool,
    pub publish_enabled: bool,
    pub unpublish_enabled: bool,
    pub leave_enabled: bool,
}

/// Stateless output sink. Implementations never mutate session state and
/// never see provider objects.
pub trait Renderer: Send + Sync {
    fn render(&self, snapshot: &SessionSnapshot);

    /// Drop any per-participant output resource (e.g. an audio sink) keyed by
    /// this id. Absence of such a resource is not an error.
    fn release_output(&self, participant: &ParticipantId);
}
