//! Command tag generator.
//!
//! Tags are used to match commands with their responses.

/// Tag generator for poll commands.
///
/// Generates unique sequential tags in the format `a1`, `a2`, and so on.
/// Each session owns its own generator, so tags are unique within a
/// session and strictly increasing in issuing order.
#[derive(Debug)]
pub struct TagGenerator {
    counter: u64,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&mut self) -> String {
        self.counter += 1;
        format!("{}{}", self.prefix, self.counter)
    }

    /// Returns how many tags have been generated so far.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.counter
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('a')
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next(), "a1");
        assert_eq!(generator.next(), "a2");
        assert_eq!(generator.next(), "a3");
    }

    #[test]
    fn test_custom_prefix() {
        let mut generator = TagGenerator::new('t');
        assert_eq!(generator.next(), "t1");
        assert_eq!(generator.next(), "t2");
    }

    #[test]
    fn test_issued() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.issued(), 0);
        let _ = generator.next();
        assert_eq!(generator.issued(), 1);
    }

    #[test]
    fn test_uniqueness_and_order() {
        let mut generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();
        let mut previous = 0u64;

        for _ in 0..10000 {
            let tag = generator.next();
            assert!(seen.insert(tag.clone()), "duplicate tag generated");
            let n: u64 = tag[1..].parse().unwrap();
            assert!(n > previous, "tags not strictly increasing");
            previous = n;
        }
    }
}
