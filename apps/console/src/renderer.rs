use session_core::{Renderer, SessionSnapshot};
use transport::ParticipantId;

/// Projects the session onto the terminal. Stateless; it only reads the
/// snapshot it is handed.
pub struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn render(&self, snapshot: &SessionSnapshot) {
        let controls = snapshot.controls();
        println!("user: {}", snapshot.user_id_display());
        println!(
            "controls: join={} publish={} unpublish={} leave={}",
            enabled(controls.join_enabled),
            enabled(controls.publish_enabled),
            enabled(controls.unpublish_enabled),
            enabled(controls.leave_enabled),
        );

        let mut participants: Vec<&ParticipantId> = snapshot.participants.iter().collect();
        participants.sort_by(|a, b| a.0.cmp(&b.0));
        println!("participants ({}):", participants.len());
        for participant in participants {
            let speaking = if snapshot.is_speaking(participant) {
                " (speaking)"
            } else {
                ""
            };
            println!("  {participant}{speaking}");
        }
    }

    fn release_output(&self, participant: &ParticipantId) {
        // the terminal holds no per-participant sink
        tracing::debug!(participant = %participant, "no output resource to release");
    }
}

fn enabled(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
