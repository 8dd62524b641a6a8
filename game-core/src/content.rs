//! Deterministic content generation. Every generator takes the room's
//! seeded RNG so that all players (and replays) see identical content.
//! Lesson-specific content lives outside this crate; these built-in pools
//! back rooms that start without a lesson id.

use rand::rngs::StdRng;
use rand::Rng;

pub const WORDS: &[&str] = &[
    "time", "year", "people", "way", "day", "man", "thing", "woman", "life", "child", "world",
    "school", "state", "family", "student", "group", "country", "problem", "hand", "part", "place",
    "case", "week", "company", "system", "program", "question", "work", "number", "night", "point",
    "home", "water", "room", "mother", "area", "money", "story", "fact", "month", "lot", "right",
    "study", "book", "eye", "job", "word", "business", "issue", "side", "kind", "head", "house",
    "service", "friend", "father", "power", "hour", "game", "line", "end", "member", "law", "car",
    "city", "community", "name", "president", "team", "minute", "idea", "kid", "body",
];

pub const PASSAGES: &[&str] = &[
    "the quick brown fox jumps over the lazy dog while the sun sets behind the hills",
    "every morning the baker kneads fresh dough before the town wakes and the ovens warm",
    "a steady hand and a patient mind will carry you further than speed ever could",
    "rivers carve canyons not by force but by persistence over countless quiet years",
    "practice is the art of repeating small things until they become second nature",
];

pub fn random_char(rng: &mut StdRng) -> char {
    (b'a' + rng.gen_range(0..26u8)) as char
}

pub fn char_sequence(rng: &mut StdRng, len: usize) -> String {
    (0..len).map(|_| random_char(rng)).collect()
}

pub fn random_word(rng: &mut StdRng) -> &'static str {
    WORDS[rng.gen_range(0..WORDS.len())]
}

pub fn random_passage(rng: &mut StdRng) -> &'static str {
    PASSAGES[rng.gen_range(0..PASSAGES.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_same_seed_same_content() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        assert_eq!(char_sequence(&mut a, 50), char_sequence(&mut b, 50));
        assert_eq!(random_word(&mut a), random_word(&mut b));
        assert_eq!(random_passage(&mut a), random_passage(&mut b));
    }

    #[test]
    fn test_char_sequence_is_lowercase_ascii() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(char_sequence(&mut rng, 200)
            .chars()
            .all(|c| c.is_ascii_lowercase()));
    }
}
