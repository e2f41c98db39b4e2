//! Keyword command router.
//!
//! Maps free text to an [`Intent`] by ordered substring matching. The first
//! rule that matches wins, so the table order is part of the behavior: an
//! utterance mentioning both "help" and "weather" is an emergency.
//!
//! | Order | Intent | Matches when the lower-cased text contains |
//! |-------|--------|---------------------------------------------|
//! | 1 | `Emergency` | help, emergency, accident, fall, ambulance |
//! | 2 | `Time` | time |
//! | 3 | `Date` | date |
//! | 4 | `Weather` | weather |
//! | 5 | `News` | news |
//! | 6 | `Joke` | joke |
//! | 7 | `PlayMusic` | play music, play song |
//! | 8 | `Reminder` | remind me, reminder |
//! | 9 | `Medication` | medication, pill, medicine |
//! | 10 | `OpenWebsite` | open, plus one of http, `.`, website |
//! | 11 | `Exit` | exit, quit, goodbye |
//!
//! Anything else is [`Intent::Fallback`] (LLM, then encyclopedia).

/// What a command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Emergency,
    Time,
    Date,
    Weather,
    News,
    Joke,
    PlayMusic,
    Reminder,
    Medication,
    OpenWebsite,
    Exit,
    Fallback,
}

/// How a rule tests the normalized command.
enum Matcher {
    /// Any of the keywords is a substring.
    Any(&'static [&'static str]),
    /// The first keyword plus any of the rest.
    AllOf(&'static str, &'static [&'static str]),
}

impl Matcher {
    fn matches(&self, cmd: &str) -> bool {
        match self {
            Self::Any(words) => words.iter().any(|w| cmd.contains(w)),
            Self::AllOf(required, any) => {
                cmd.contains(required) && any.iter().any(|w| cmd.contains(w))
            }
        }
    }
}

const RULES: &[(Intent, Matcher)] = &[
    (
        Intent::Emergency,
        Matcher::Any(&["help", "emergency", "accident", "fall", "ambulance"]),
    ),
    (Intent::Time, Matcher::Any(&["time"])),
    (Intent::Date, Matcher::Any(&["date"])),
    (Intent::Weather, Matcher::Any(&["weather"])),
    (Intent::News, Matcher::Any(&["news"])),
    (Intent::Joke, Matcher::Any(&["joke"])),
    (Intent::PlayMusic, Matcher::Any(&["play music", "play song"])),
    (Intent::Reminder, Matcher::Any(&["remind me", "reminder"])),
    (
        Intent::Medication,
        Matcher::Any(&["medication", "pill", "medicine"]),
    ),
    (
        Intent::OpenWebsite,
        Matcher::AllOf("open", &["http", ".", "website"]),
    ),
    (Intent::Exit, Matcher::Any(&["exit", "quit", "goodbye"])),
];

/// Lower-case and trim a raw command the way every rule expects it.
#[must_use]
pub fn normalize(command: &str) -> String {
    command.trim().to_lowercase()
}

/// Classify a raw command.
#[must_use]
pub fn classify(command: &str) -> Intent {
    let cmd = normalize(command);
    RULES
        .iter()
        .find(|(_, matcher)| matcher.matches(&cmd))
        .map_or(Intent::Fallback, |(intent, _)| *intent)
}

/// Turn an "open ..." command into a URL.
///
/// Removes the word "open" (any case) and, for non-URL targets, the word
/// "website", then prefixes `https://` when the target does not already
/// start with `http`.
#[must_use]
pub fn website_target(command: &str) -> String {
    let mut target = remove_word_ci(command, "open").trim().to_owned();
    if !target.to_lowercase().starts_with("http") {
        target = remove_word_ci(&target, "website").trim().to_owned();
        if !target.to_lowercase().starts_with("http") {
            target = format!("https://{target}");
        }
    }
    target
}

/// Remove every case-insensitive occurrence of `word` from `text`.
fn remove_word_ci(text: &str, word: &str) -> String {
    let lower = text.to_lowercase();
    // Lower-casing can change byte lengths for non-ASCII text; fall back to
    // an exact-case removal in that case.
    if lower.len() != text.len() {
        return text.replace(word, "");
    }
    let mut out = String::with_capacity(text.len());
    let mut idx = 0;
    while let Some(pos) = lower[idx..].find(word) {
        out.push_str(&text[idx..idx + pos]);
        idx += pos + word.len();
    }
    out.push_str(&text[idx..]);
    out
}
