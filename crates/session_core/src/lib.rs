//! Session controller for a real-time audio conferencing room.
//!
//! The controller is the single writer of session state and the single caller
//! of the transport provider. User actions (join/publish/unpublish/leave) and
//! provider room events are reconciled here into one consistent view, which
//! is pushed to the renderer after every mutation.

use std::{collections::HashSet, sync::Arc};

use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use transport::{
    ConferenceTransport, JoinOptions, MediaKind, MicrophoneTrack, ParticipantId, RoomEvent, UserId,
};

pub mod render;
pub use render::{Controls, Renderer, SessionSnapshot};

#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation invoked in a state that forbids it. Disabled controls make
    /// this unreachable from the UI; the controller rejects it regardless.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("capture device unavailable: {0}")]
    Device(String),
}

/// Out-of-band reports from event-handler side work. These never roll back
/// state that was already applied.
#[derive(Debug, Clone)]
pub enum SessionNotice {
    SubscribeFailed {
        participant: ParticipantId,
        reason: String,
    },
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Idle,
    Joining,
    Joined,
    Leaving,
}

struct SessionState {
    phase: SessionPhase,
    current_user_id: Option<UserId>,
    published: bool,
    publish_pending: bool,
    unpublish_pending: bool,
    participants: HashSet<ParticipantId>,
    speakers: HashSet<ParticipantId>,
    // Bumped on every leave; stale in-flight work checks it before touching
    // the fresh session.
    generation: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            current_user_id: None,
            published: false,
            publish_pending: false,
            unpublish_pending: false,
            participants: HashSet::new(),
            speakers: HashSet::new(),
            generation: 0,
        }
    }

    fn joined(&self) -> bool {
        self.phase == SessionPhase::Joined
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_user_id: self.current_user_id,
            joined: self.joined(),
            published: self.published,
            participants: self.participants.clone(),
            speakers: self.speakers.clone(),
        }
    }

    fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self::new();
        self.generation = generation;
    }
}

pub struct SessionController {
    transport: Arc<dyn ConferenceTransport>,
    renderer: Arc<dyn Renderer>,
    state: Mutex<SessionState>,
    local_track: Mutex<Option<Arc<dyn MicrophoneTrack>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionController {
    pub fn new(transport: Arc<dyn ConferenceTransport>, renderer: Arc<dyn Renderer>) -> Arc<Self> {
        let (notices, _) = broadcast::channel(64);
        Arc::new(Self {
            transport,
            renderer,
            state: Mutex::new(SessionState::new()),
            local_track: Mutex::new(None),
            event_task: Mutex::new(None),
            notices,
        })
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Join the named channel. Rejects while another join is in flight, while
    /// joined, or while a leave is running; a provider rejection leaves the
    /// session idle.
    pub async fn join(self: &Arc<Self>, options: JoinOptions) -> Result<UserId, SessionError> {
        {
            let mut state = self.state.lock().await;
            match state.phase {
                SessionPhase::Joining => {
                    return Err(SessionError::InvalidState("join already in progress"))
                }
                SessionPhase::Joined => return Err(SessionError::InvalidState("already joined")),
                SessionPhase::Leaving => return Err(SessionError::InvalidState("leave in progress")),
                SessionPhase::Idle => state.phase = SessionPhase::Joining,
            }
        }

        let channel = options.channel.clone();
        match self.transport.join(options).await {
            Ok(user_id) => {
                let (snapshot, generation) = {
                    let mut state = self.state.lock().await;
                    state.phase = SessionPhase::Joined;
                    state.current_user_id = Some(user_id);
                    (state.snapshot(), state.generation)
                };
                info!(user_id = user_id.0, channel = %channel, "joined channel");

                let task = self.spawn_event_task(generation);
                if let Some(previous) = self.event_task.lock().await.replace(task) {
                    previous.abort();
                }

                self.renderer.render(&snapshot);
                Ok(user_id)
            }
            Err(err) => {
                self.state.lock().await.phase = SessionPhase::Idle;
                Err(SessionError::Transport(err.to_string()))
            }
        }
    }

    /// Acquire the microphone and publish it into the channel. A publish
    /// failure after acquisition still releases the track.
    pub async fn publish(&self) -> Result<(), SessionError> {
        let generation = {
            let mut state = self.state.lock().await;
            if !state.joined() {
                return Err(SessionError::InvalidState("not joined"));
            }
            if state.published {
                return Err(SessionError::InvalidState("already published"));
            }
            if state.publish_pending {
                return Err(SessionError::InvalidState("publish already in progress"));
            }
            state.publish_pending = true;
            state.generation
        };

        let result = self.acquire_and_publish(generation).await;
        self.state.lock().await.publish_pending = false;
        result
    }

    async fn acquire_and_publish(&self, generation: u64) -> Result<(), SessionError> {
        let track = self
            .transport
            .acquire_microphone_track()
            .await
            .map_err(|err| SessionError::Device(err.to_string()))?;

        if let Err(err) = self.transport.publish(Arc::clone(&track)).await {
            track.release().await;
            return Err(SessionError::Transport(err.to_string()));
        }

        let snapshot = {
            let mut state = self.state.lock().await;
            // A leave may have started (phase left Joined) or fully completed
            // (generation bumped) while the provider publish was in flight.
            if state.generation != generation || !state.joined() {
                drop(state);
                track.release().await;
                return Err(SessionError::InvalidState("session ended during publish"));
            }
            *self.local_track.lock().await = Some(track);
            state.published = true;
            state.snapshot()
        };
        info!("local audio published");
        self.renderer.render(&snapshot);
        Ok(())
    }

    /// Stop publishing and release the capture track.
    pub async fn unpublish(&self) -> Result<(), SessionError> {
        let generation = {
            let mut state = self.state.lock().await;
            if !state.joined() {
                return Err(SessionError::InvalidState("not joined"));
            }
            if !state.published {
                return Err(SessionError::InvalidState("nothing published"));
            }
            if state.unpublish_pending {
                return Err(SessionError::InvalidState("unpublish already in progress"));
            }
            state.unpublish_pending = true;
            state.generation
        };

        if let Err(err) = self.transport.unpublish().await {
            self.state.lock().await.unpublish_pending = false;
            return Err(SessionError::Transport(err.to_string()));
        }

        if let Some(track) = self.local_track.lock().await.take() {
            track.release().await;
        }

        let snapshot = {
            let mut state = self.state.lock().await;
            state.unpublish_pending = false;
            if state.generation != generation {
                // A leave completed while unpublish was in flight; the fresh
                // state is already rendered.
                return Ok(());
            }
            state.published = false;
            state.snapshot()
        };
        info!("local audio unpublished");
        self.renderer.render(&snapshot);
        Ok(())
    }

    /// Leave the channel. Unpublish and provider leave are best-effort; the
    /// local session always resets to the initial state.
    pub async fn leave(&self) -> Result<(), SessionError> {
        let (published, unpublish_in_flight) = {
            let mut state = self.state.lock().await;
            match state.phase {
                SessionPhase::Idle => return Err(SessionError::InvalidState("not joined")),
                SessionPhase::Joining => {
                    return Err(SessionError::InvalidState("join in progress"))
                }
                SessionPhase::Leaving => {
                    return Err(SessionError::InvalidState("leave already in progress"))
                }
                SessionPhase::Joined => state.phase = SessionPhase::Leaving,
            }
            (state.published, state.unpublish_pending)
        };

        // an in-flight unpublish() has already issued the provider call
        if published && !unpublish_in_flight {
            if let Err(err) = self.transport.unpublish().await {
                warn!(error = %err, "best-effort unpublish before leave failed");
                let _ = self
                    .notices
                    .send(SessionNotice::Error(format!(
                        "unpublish before leave failed: {err}"
                    )));
            }
        }

        if let Some(track) = self.local_track.lock().await.take() {
            track.release().await;
        }

        if let Err(err) = self.transport.leave().await {
            warn!(error = %err, "provider leave failed; resetting local session anyway");
            let _ = self
                .notices
                .send(SessionNotice::Error(format!("leave failed: {err}")));
        }

        if let Some(task) = self.event_task.lock().await.take() {
            task.abort();
        }

        let snapshot = {
            let mut state = self.state.lock().await;
            state.reset();
            state.snapshot()
        };
        info!("left channel");
        self.renderer.render(&snapshot);
        Ok(())
    }

    /// Apply one provider room event. Events belonging to an already-ended
    /// session are dropped, never applied to the fresh state.
    pub async fn handle_room_event(self: &Arc<Self>, event: RoomEvent) {
        match event {
            RoomEvent::ParticipantJoined(participant) => {
                self.on_participant_joined(participant).await
            }
            RoomEvent::ParticipantLeft(participant) => self.on_participant_left(participant).await,
            RoomEvent::ParticipantPublished { participant, kind } => {
                self.on_participant_published(participant, kind).await
            }
            RoomEvent::ParticipantUnpublished(participant) => {
                self.on_participant_unpublished(participant).await
            }
        }
    }

    pub async fn on_participant_joined(&self, participant: ParticipantId) {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.joined() {
                debug!(participant = %participant, "dropping participant-joined outside a session");
                return;
            }
            state.participants.insert(participant);
            state.snapshot()
        };
        self.renderer.render(&snapshot);
    }

    pub async fn on_participant_left(&self, participant: ParticipantId) {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.joined() {
                debug!(participant = %participant, "dropping participant-left outside a session");
                return;
            }
            state.participants.remove(&participant);
            // A departed participant cannot remain a speaker.
            state.speakers.remove(&participant);
            state.snapshot()
        };
        self.renderer.render(&snapshot);
    }

    /// A publish event may arrive before the matching join event; publishing
    /// implies presence, so the participant is inserted into both sets.
    pub async fn on_participant_published(
        self: &Arc<Self>,
        participant: ParticipantId,
        kind: MediaKind,
    ) {
        let (snapshot, generation) = {
            let mut state = self.state.lock().await;
            if !state.joined() {
                debug!(participant = %participant, "dropping participant-published outside a session");
                return;
            }
            state.participants.insert(participant.clone());
            state.speakers.insert(participant.clone());
            (state.snapshot(), state.generation)
        };
        self.renderer.render(&snapshot);

        // Render is never blocked on the subscription; playback starts
        // independently and its failure does not undo the speaker entry.
        if kind == MediaKind::Audio {
            let controller = Arc::clone(self);
            tokio::spawn(async move {
                controller.subscribe_and_play(generation, participant).await;
            });
        }
    }

    pub async fn on_participant_unpublished(&self, participant: ParticipantId) {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.joined() {
                debug!(participant = %participant, "dropping participant-unpublished outside a session");
                return;
            }
            state.speakers.remove(&participant);
            state.snapshot()
        };
        self.renderer.render(&snapshot);
        self.renderer.release_output(&participant);
    }

    async fn subscribe_and_play(&self, generation: u64, participant: ParticipantId) {
        let track = match self.transport.subscribe(&participant, MediaKind::Audio).await {
            Ok(track) => track,
            Err(err) => {
                warn!(participant = %participant, error = %err, "subscribe failed");
                let _ = self.notices.send(SessionNotice::SubscribeFailed {
                    participant,
                    reason: err.to_string(),
                });
                return;
            }
        };

        if self.state.lock().await.generation != generation {
            debug!(participant = %participant, "session ended before remote audio playback started");
            return;
        }

        if let Err(err) = track.play().await {
            warn!(participant = %participant, error = %err, "remote audio playback failed");
            let _ = self.notices.send(SessionNotice::SubscribeFailed {
                participant,
                reason: err.to_string(),
            });
        }
    }

    fn spawn_event_task(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let mut events = self.transport.subscribe_events();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if controller.state.lock().await.generation != generation {
                    debug!("dropping room event delivered after leave");
                    break;
                }
                controller.handle_room_event(event).await;
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
