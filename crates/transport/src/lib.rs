//! Capability surface consumed from the conferencing transport provider.
//!
//! The session controller only ever talks to these traits; a concrete SDK
//! backend implements them and pushes room events over the broadcast channel.

use std::{fmt, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Identifier the provider assigns to this client when a join succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of a remote participant; equality is by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    pub channel: String,
    pub app_id: String,
    pub token: Option<String>,
}

/// Membership and media events pushed by the provider, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    ParticipantJoined(ParticipantId),
    ParticipantLeft(ParticipantId),
    ParticipantPublished {
        participant: ParticipantId,
        kind: MediaKind,
    },
    ParticipantUnpublished(ParticipantId),
}

/// Exclusive handle to the local microphone capture track. Every acquisition
/// must be matched by exactly one `release`.
#[async_trait]
pub trait MicrophoneTrack: Send + Sync {
    async fn release(&self);
}

/// Playable handle to a subscribed remote audio stream.
#[async_trait]
pub trait RemoteAudioTrack: Send + Sync {
    async fn play(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ConferenceTransport: Send + Sync {
    async fn join(&self, options: JoinOptions) -> anyhow::Result<UserId>;
    async fn leave(&self) -> anyhow::Result<()>;
    async fn acquire_microphone_track(&self) -> anyhow::Result<Arc<dyn MicrophoneTrack>>;
    async fn publish(&self, track: Arc<dyn MicrophoneTrack>) -> anyhow::Result<()>;
    async fn unpublish(&self) -> anyhow::Result<()>;
    async fn subscribe(
        &self,
        participant: &ParticipantId,
        kind: MediaKind,
    ) -> anyhow::Result<Arc<dyn RemoteAudioTrack>>;
    fn subscribe_events(&self) -> broadcast::Receiver<RoomEvent>;
}

/// Null transport for wiring the controller before a backend SDK exists.
pub struct MissingConferenceTransport {
    events: broadcast::Sender<RoomEvent>,
}

impl MissingConferenceTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self { events }
    }
}

impl Default for MissingConferenceTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConferenceTransport for MissingConferenceTransport {
    async fn join(&self, options: JoinOptions) -> anyhow::Result<UserId> {
        Err(anyhow!(
            "conference transport backend is unavailable for channel {}",
            options.channel
        ))
    }

    async fn leave(&self) -> anyhow::Result<()> {
        Err(anyhow!("conference transport backend is unavailable"))
    }

    async fn acquire_microphone_track(&self) -> anyhow::Result<Arc<dyn MicrophoneTrack>> {
        Err(anyhow!("conference transport backend is unavailable"))
    }

    async fn publish(&self, _track: Arc<dyn MicrophoneTrack>) -> anyhow::Result<()> {
        Err(anyhow!("conference transport backend is unavailable"))
    }

    async fn unpublish(&self) -> anyhow::Result<()> {
        Err(anyhow!("conference transport backend is unavailable"))
    }

    async fn subscribe(
        &self,
        participant: &ParticipantId,
        _kind: MediaKind,
    ) -> anyhow::Result<Arc<dyn RemoteAudioTrack>> {
        Err(anyhow!(
            "conference transport backend is unavailable for participant {participant}"
        ))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }
}
