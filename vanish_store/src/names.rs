//! Sources of human-readable names for new buffers

use rand::Rng;

/// Produces candidate names. Uniqueness is enforced by the store, not the source
pub trait NameSource: Send + Sync {
    fn next_name(&self) -> String;
}

/// Lowercase `adjective-noun-NNNN` names, e.g. `quiet-otter-4821`
#[derive(Default, Debug, Copy, Clone)]
pub struct SillyNames;

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "dusty", "eager", "faint", "gentle", "hollow", "icy", "jolly",
    "keen", "lucky", "mellow", "nimble", "odd", "pale", "quiet", "rusty", "silent", "tidy",
    "upbeat", "vivid", "wild", "young", "zesty", "bold", "crisp", "dizzy", "fuzzy", "hasty",
    "misty", "sleepy",
];

const NOUNS: &[&str] = &[
    "otter", "badger", "falcon", "lantern", "meadow", "comet", "walrus", "pebble", "harbor",
    "thistle", "beacon", "canyon", "dingo", "ember", "fjord", "gecko", "heron", "island",
    "jackal", "kettle", "lagoon", "marmot", "nebula", "orchid", "puffin", "quartz", "raven",
    "saddle", "tundra", "urchin", "violet", "willow",
];

const SUFFIX_RANGE: u32 = 10_000;

impl NameSource for SillyNames {
    fn next_name(&self) -> String {
        let mut rng = rand::thread_rng();
        let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
        let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
        let suffix = rng.gen_range(0..SUFFIX_RANGE);
        format!("{adjective}-{noun}-{suffix:04}")
    }
}

#[cfg(test)]
mod tests {
    use super::{NameSource, SillyNames};

    #[test]
    fn names_are_lowercase_and_url_safe() {
        for _ in 0..100 {
            let name = SillyNames.next_name();
            assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert_eq!(name.split('-').count(), 3);
        }
    }
}
