//! Reading time estimate for a post body

use super::Section;

/// Average human reading speed
pub const WORDS_PER_MINUTE: usize = 200;

/// Count whitespace-separated words in headings and body fragments
pub fn word_count(sections: &[Section]) -> usize {
    sections
        .iter()
        .map(|section| {
            let body: usize = section
                .body
                .iter()
                .map(|block| block.text.split_whitespace().count())
                .sum();
            section.heading.split_whitespace().count() + body
        })
        .sum()
}

/// Minutes needed to read the sections, rounded up
///
/// Empty content reads in zero minutes.
pub fn reading_time(sections: &[Section], words_per_minute: usize) -> usize {
    let words = word_count(sections);
    if words == 0 {
        return 0;
    }
    words.div_ceil(words_per_minute.max(1))
}
