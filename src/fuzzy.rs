//! Answer matching for typed activity items.
//!
//! Correctness is decided only by `answers_match`. Edit distance picks the
//! tone of the first-miss hint and never turns a wrong answer into a right one.

/// How close a wrong answer was, for hint wording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintTone {
  Almost,
  NotQuite,
}

/// Levenshtein distance over chars (full DP table, no early exit).
/// An empty operand yields the other operand's length.
pub fn edit_distance(a: &str, b: &str) -> usize {
  let a_chars: Vec<char> = a.chars().collect();
  let b_chars: Vec<char> = b.chars().collect();
  let a_len = a_chars.len();
  let b_len = b_chars.len();

  if a_len == 0 {
    return b_len;
  }
  if b_len == 0 {
    return a_len;
  }

  let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];
  for (i, row) in matrix.iter_mut().enumerate() {
    row[0] = i;
  }
  for j in 0..=b_len {
    matrix[0][j] = j;
  }

  for i in 1..=a_len {
    for j in 1..=b_len {
      let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
      matrix[i][j] = (matrix[i - 1][j] + 1)
        .min(matrix[i][j - 1] + 1)
        .min(matrix[i - 1][j - 1] + cost);
    }
  }

  matrix[a_len][b_len]
}

/// Lowercase, trim, collapse inner whitespace, drop one trailing `.,!?;:`.
pub fn normalize_answer(s: &str) -> String {
  let lowered = s.to_lowercase();
  let mut collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
  if collapsed.ends_with(['.', ',', '!', '?', ';', ':']) {
    collapsed.pop();
  }
  collapsed
}

/// Exact (case-insensitive, trimmed) or normalized equality.
pub fn answers_match(user: &str, correct: &str) -> bool {
  let exact = user.trim().to_lowercase() == correct.trim().to_lowercase();
  exact || normalize_answer(user) == normalize_answer(correct)
}

/// Short targets (<= 4 chars) tolerate one edit, longer ones two.
pub fn hint_tone(user: &str, correct: &str) -> HintTone {
  let user = user.trim().to_lowercase();
  let target = correct.trim().to_lowercase();
  let threshold = if target.chars().count() <= 4 { 1 } else { 2 };
  let dist = edit_distance(&user, &target);
  if dist > 0 && dist <= threshold {
    HintTone::Almost
  } else {
    HintTone::NotQuite
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn distance_basics() {
    assert_eq!(edit_distance("", "abc"), 3);
    assert_eq!(edit_distance("abc", ""), 3);
    assert_eq!(edit_distance("kitten", "sitting"), 3);
    assert_eq!(edit_distance("dog", "dog"), 0);
    assert_eq!(edit_distance("dog", "dig"), 1);
  }

  #[test]
  fn normalized_answers_are_accepted() {
    assert!(answers_match("  Cat. ", "cat"));
    assert!(answers_match("the  Sun is   hot!", "The sun is hot"));
    assert!(answers_match("DOG", "dog"));
    assert!(!answers_match("dig", "dog"));
    assert!(!answers_match("", "dog"));
  }

  #[test]
  fn only_one_trailing_mark_is_dropped() {
    assert_eq!(normalize_answer("Wow!!"), "wow!");
    assert_eq!(normalize_answer("  Hello   World. "), "hello world");
  }

  #[test]
  fn tone_threshold_depends_on_target_length() {
    assert_eq!(hint_tone("dig", "dog"), HintTone::Almost);
    assert_eq!(hint_tone("cow", "dog"), HintTone::NotQuite);
    assert_eq!(hint_tone("dgg", "dog"), HintTone::Almost);
    // two edits: too far for a short word, close enough for a long one
    assert_eq!(hint_tone("dug", "dogs"), HintTone::NotQuite);
    assert_eq!(hint_tone("becuz", "because"), HintTone::NotQuite);
    assert_eq!(hint_tone("becaus", "because"), HintTone::Almost);
    assert_eq!(hint_tone("bekaus", "because"), HintTone::Almost);
  }

  #[test]
  fn identical_after_lowering_is_not_almost() {
    assert_eq!(hint_tone("Dog", "dog"), HintTone::NotQuite);
  }
}
