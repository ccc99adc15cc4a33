//! Pronounceable agent identifiers.
//!
//! Names are stateless random tokens, not reserved anywhere: `recall` finds
//! them again only through the prompts they were used with.

use rand_core::{OsRng, RngCore};

const ADJECTIVES: &[&str] = &[
  "amber", "brisk", "calm", "deft", "eager", "fond", "glad", "hale", "keen",
  "lucid", "mellow", "nimble", "plain", "quiet", "ready", "sly", "tidy",
  "vivid", "warm", "young",
];

const ANIMALS: &[&str] = &[
  "badger", "crane", "dingo", "egret", "ferret", "gecko", "heron", "ibis",
  "jackal", "koala", "lemur", "marten", "newt", "otter", "plover", "quail",
  "raven", "stoat", "tapir", "wren",
];

/// A fresh `adjective-animal-NN` identifier.
pub fn generate() -> String {
  let mut rng = OsRng;
  let adjective = ADJECTIVES[rng.next_u32() as usize % ADJECTIVES.len()];
  let animal = ANIMALS[rng.next_u32() as usize % ANIMALS.len()];
  let number = rng.next_u32() % 100;
  format!("{adjective}-{animal}-{number:02}")
}

#[cfg(test)]
mod tests {
  use super::generate;

  #[test]
  fn names_have_three_parts() {
    for _ in 0..32 {
      let name = generate();
      let parts: Vec<_> = name.split('-').collect();
      assert_eq!(parts.len(), 3, "unexpected shape: {name}");
      assert_eq!(parts[2].len(), 2);
      assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }
  }
}
