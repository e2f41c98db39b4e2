//! Canned jokes.

use rand::seq::SliceRandom;

pub const JOKES: [&str; 3] = [
    "Why don't scientists trust atoms? Because they make up everything.",
    "I told my wife she drew her eyebrows too high. She looked surprised.",
    "What do you call a fake noodle? An impasta!",
];

/// Pick one joke at random.
#[must_use]
pub fn random_joke() -> &'static str {
    let mut rng = rand::thread_rng();
    JOKES.choose(&mut rng).copied().unwrap_or(JOKES[0])
}
