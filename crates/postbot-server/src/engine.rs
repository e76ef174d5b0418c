use postbot_contracts::{ChatReply, TurnRequest};
use postbot_kernel::{
    directory_unavailable_reply, greeting_reply, invalid_pincode_reply, is_valid_pincode,
    keyword_reply, location_reply, location_unresolved_reply, normalize_message,
    not_understood_reply, pincode_prompt_reply, pincode_reply, select_route,
    share_location_reply, Route, SessionState, TurnView,
};

use crate::gateway::{Unavailable, UpstreamGateway};
use crate::knowledge::KnowledgeBase;
use crate::session::{SessionGuard, SessionStore};

/// Resolves one turn into one reply. The session stays locked for the whole
/// turn, so a session's turns never interleave.
pub struct ChatEngine {
    knowledge: KnowledgeBase,
    gateway: UpstreamGateway,
    sessions: SessionStore,
}

impl ChatEngine {
    pub fn new(knowledge: KnowledgeBase, gateway: UpstreamGateway, sessions: SessionStore) -> Self {
        Self {
            knowledge,
            gateway,
            sessions,
        }
    }

    pub async fn handle_turn(&self, session_id: &str, turn: &TurnRequest) -> ChatReply {
        let message = normalize_message(&turn.message);
        let mut session = self.sessions.lock(session_id).await;
        let view = TurnView {
            message: &message,
            has_coordinates: turn.coordinates().is_some(),
            state: session.get(),
        };
        let route = select_route(&view);
        tracing::debug!(
            session = session_id,
            route = ?route,
            state = view.state.map(SessionState::as_str),
            "dispatching turn"
        );

        match route {
            Route::Reset => self.reset(&mut session).await,
            Route::Location => match turn.coordinates() {
                Some((lat, lon)) => self.search_by_location(lat, lon).await,
                None => self.answer_from_knowledge(&message).await,
            },
            Route::PincodeContinuation => self.continue_pincode_entry(&mut session, &message).await,
            Route::FindByPincode => {
                session.set(SessionState::AwaitingPincode);
                pincode_prompt_reply()
            }
            Route::FindOfficeByLocation => share_location_reply(),
            Route::Keyword => self.answer_from_knowledge(&message).await,
        }
    }

    async fn reset(&self, session: &mut SessionGuard) -> ChatReply {
        session.clear();
        let entries = self.knowledge.load().await;
        greeting_reply(&entries, &mut rand::rng())
    }

    async fn search_by_location(&self, lat: f64, lon: f64) -> ChatReply {
        let pincode = match self.gateway.resolve_coordinates(lat, lon).await {
            Ok(v) => v,
            Err(Unavailable::ForeignPostcode(postcode)) => return location_reply(&postcode, None),
            Err(_) => return location_unresolved_reply(),
        };
        let record = self.gateway.resolve_pincode(&pincode).await.ok();
        location_reply(&pincode, record.as_ref())
    }

    async fn continue_pincode_entry(&self, session: &mut SessionGuard, message: &str) -> ChatReply {
        if !is_valid_pincode(message) {
            return invalid_pincode_reply();
        }
        match self.gateway.resolve_pincode(message).await {
            Ok(record) => {
                session.clear();
                pincode_reply(message, &record)
            }
            // The user is still mid-flow; let them retry.
            Err(_) => directory_unavailable_reply(),
        }
    }

    async fn answer_from_knowledge(&self, message: &str) -> ChatReply {
        let entries = self.knowledge.load().await;
        keyword_reply(&entries, message, &mut rand::rng()).unwrap_or_else(not_understood_reply)
    }
}
