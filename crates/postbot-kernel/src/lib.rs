use std::time::Duration;

use postbot_contracts::{
    Answer, ChatReply, DirectoryRecord, KnowledgeEntry, PostOffice, ReplyOption,
};
use rand::seq::IndexedRandom;
use rand::Rng;

pub const RESET: &str = "reset";
pub const FIND_BY_PINCODE: &str = "find_by_pincode";
pub const FIND_OFFICE_BY_LOCATION: &str = "find_office_by_location";
pub const GREETING_KEYWORD: &str = "hi";
pub const DEFAULT_GREETING: &str = "Hello! Welcome to India Post Assistant.";
pub const DEFAULT_MENU: [&str; 3] = ["Track & Trace", "Find Post Office", "Banking Services"];
pub const MAX_OFFICE_OPTIONS: usize = 5;

pub const MSG_LOCATION_UNRESOLVED: &str = "I could not determine the pincode for your location.";
pub const MSG_LOCATION_NO_OFFICES: &str =
    "Sorry, I could not find post offices near your location.";
pub const MSG_INVALID_PINCODE: &str =
    "That doesn't look like a valid Pincode. Please enter a 6-digit number.";
pub const MSG_DIRECTORY_UNAVAILABLE: &str = "Sorry, we couldn't fetch pincode information at this time. Please enter a valid 6-digit number to try again.";
pub const MSG_PINCODE_PROMPT: &str =
    "Please enter the 6-digit pincode to search for post offices:";
pub const MSG_SHARE_LOCATION: &str = "Please share your location to find nearby post offices.";
pub const MSG_NOT_UNDERSTOOD: &str = "I'm not sure I understand. How can I help you?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingPincode,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::AwaitingPincode => "awaiting_pincode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Reset,
    Location,
    PincodeContinuation,
    FindByPincode,
    FindOfficeByLocation,
    Keyword,
}

/// What the dispatcher sees of a turn: the normalized message, whether a
/// full coordinate pair came with it, and the session's pending state.
#[derive(Debug, Clone, Copy)]
pub struct TurnView<'a> {
    pub message: &'a str,
    pub has_coordinates: bool,
    pub state: Option<SessionState>,
}

pub type RoutePredicate = fn(&TurnView<'_>) -> bool;

/// Dispatch order. The first predicate that holds picks the route.
pub const ROUTES: &[(Route, RoutePredicate)] = &[
    (Route::Reset, is_reset),
    (Route::Location, has_coordinates),
    (Route::PincodeContinuation, is_awaiting_pincode),
    (Route::FindByPincode, is_find_by_pincode),
    (Route::FindOfficeByLocation, is_find_office_by_location),
    (Route::Keyword, always),
];

fn is_reset(turn: &TurnView<'_>) -> bool {
    turn.message == RESET
}

fn has_coordinates(turn: &TurnView<'_>) -> bool {
    turn.has_coordinates
}

fn is_awaiting_pincode(turn: &TurnView<'_>) -> bool {
    turn.state == Some(SessionState::AwaitingPincode)
}

fn is_find_by_pincode(turn: &TurnView<'_>) -> bool {
    turn.message == FIND_BY_PINCODE
}

fn is_find_office_by_location(turn: &TurnView<'_>) -> bool {
    turn.message == FIND_OFFICE_BY_LOCATION
}

fn always(_: &TurnView<'_>) -> bool {
    true
}

pub fn select_route(turn: &TurnView<'_>) -> Route {
    ROUTES
        .iter()
        .find(|(_, matches)| matches(turn))
        .map(|(route, _)| *route)
        .unwrap_or(Route::Keyword)
}

pub fn normalize_message(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_pincode(candidate: &str) -> bool {
    candidate.len() == 6 && candidate.bytes().all(|b| b.is_ascii_digit())
}

/// Geocoders sometimes report postcodes with inner spacing ("110 001").
pub fn normalize_postcode(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `age` comes from a monotonic clock; an entry exactly `ttl` old is stale.
pub fn is_fresh(age: Duration, ttl: Duration) -> bool {
    age < ttl
}

pub fn office_option(office: &PostOffice) -> ReplyOption {
    let name = office.name.as_deref().unwrap_or("N/A");
    let branch = office.branch_type.as_deref().unwrap_or("Office");
    let value_name = office.name.as_deref().unwrap_or("").replace(' ', "_");
    ReplyOption::button(format!("{name} ({branch})"), format!("post_office_{value_name}"))
}

pub fn office_options(offices: &[PostOffice]) -> Vec<ReplyOption> {
    offices
        .iter()
        .take(MAX_OFFICE_OPTIONS)
        .map(office_option)
        .collect()
}

fn with_truncation_note(mut text: String, total: usize) -> String {
    if total > MAX_OFFICE_OPTIONS {
        text.push_str(&format!(" (showing {MAX_OFFICE_OPTIONS} of {total})"));
    }
    text
}

pub fn location_unresolved_reply() -> ChatReply {
    ChatReply::text(MSG_LOCATION_UNRESOLVED)
}

/// Reply for a coordinate search once the postcode is known. `None` means the
/// directory could not be reached.
pub fn location_reply(pincode: &str, record: Option<&DirectoryRecord>) -> ChatReply {
    let record = match record {
        Some(r) if r.is_success() => r,
        _ => return ChatReply::text(MSG_LOCATION_NO_OFFICES),
    };
    let offices = &record.post_offices;
    if offices.is_empty() {
        return ChatReply::text(format!(
            "No post offices found for your location (pincode {pincode})."
        ));
    }
    let text = with_truncation_note(
        format!(
            "Found {} post offices for your location (pincode {pincode}):",
            offices.len()
        ),
        offices.len(),
    );
    ChatReply::text(text).with_options(office_options(offices))
}

pub fn invalid_pincode_reply() -> ChatReply {
    ChatReply::text(MSG_INVALID_PINCODE)
}

pub fn directory_unavailable_reply() -> ChatReply {
    ChatReply::text(MSG_DIRECTORY_UNAVAILABLE)
}

/// Reply that ends a pincode entry flow.
pub fn pincode_reply(pincode: &str, record: &DirectoryRecord) -> ChatReply {
    if !record.is_success() {
        let reason = record.message.as_deref().unwrap_or("Pincode not found");
        return ChatReply::text(format!(
            "Error: {reason}. Please enter a valid 6-digit number to try again."
        ));
    }
    let offices = &record.post_offices;
    if offices.is_empty() {
        return ChatReply::text(format!(
            "No post offices found for pincode {pincode}. Please enter another 6-digit number to try again."
        ));
    }
    let text = with_truncation_note(
        format!(
            "Found {} post offices for {pincode}. Main offices:",
            offices.len()
        ),
        offices.len(),
    );
    ChatReply::text(text)
        .with_options(office_options(offices))
        .with_full_data(offices.clone())
}

pub fn pincode_prompt_reply() -> ChatReply {
    ChatReply::text(MSG_PINCODE_PROMPT)
}

pub fn share_location_reply() -> ChatReply {
    ChatReply::text(MSG_SHARE_LOCATION)
}

pub fn not_understood_reply() -> ChatReply {
    ChatReply::text(MSG_NOT_UNDERSTOOD).with_options(vec![ReplyOption::button("Go back", RESET)])
}

/// `None` when a choice answer has nothing to choose from.
pub fn resolve_answer<R: Rng + ?Sized>(answer: &Answer, rng: &mut R) -> Option<String> {
    match answer {
        Answer::Text(text) => Some(text.clone()),
        Answer::Choice {
            randomize: true,
            candidates,
        } => candidates.choose(rng).cloned(),
        Answer::Choice { candidates, .. } => candidates.first().cloned(),
    }
}

pub fn greeting_reply<R: Rng + ?Sized>(entries: &[KnowledgeEntry], rng: &mut R) -> ChatReply {
    match entries.iter().find(|e| e.has_keyword(GREETING_KEYWORD)) {
        Some(entry) => {
            let answer =
                resolve_answer(&entry.answer, rng).unwrap_or_else(|| DEFAULT_GREETING.to_string());
            let labels = entry
                .options
                .iter()
                .flatten()
                .map(|o| ReplyOption::Label(o.label().to_string()))
                .collect();
            ChatReply::text(answer).with_options(labels)
        }
        None => ChatReply::text(DEFAULT_GREETING).with_options(
            DEFAULT_MENU
                .iter()
                .map(|label| ReplyOption::Label(label.to_string()))
                .collect(),
        ),
    }
}

/// First entry (in document order) with a keyword contained in `message`.
pub fn keyword_reply<R: Rng + ?Sized>(
    entries: &[KnowledgeEntry],
    message: &str,
    rng: &mut R,
) -> Option<ChatReply> {
    entries
        .iter()
        .filter(|e| e.keywords.iter().any(|k| message.contains(k.as_str())))
        .find_map(|entry| {
            let answer = resolve_answer(&entry.answer, rng)?;
            Some(ChatReply::text(answer).with_options(entry.options.clone().unwrap_or_default()))
        })
}
