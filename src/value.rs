/*!
 * Typed Value Payloads
 *
 * Every key maps to one of five value shapes. The enum tag is the type
 * check: a command that needs a list and finds anything else answers
 * WRONGTYPE with a single pattern match, no downcasting.
 */

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};

use crate::skiplist::Skiplist;

/// String payload. Byte-strings that spell a complete decimal i64 are held
/// as the integer (the RAW vs INTEGER encoding split); everything else is
/// kept verbatim.
pub enum Str {
    Raw(Vec<u8>),
    Int(i64),
}

impl Str {
    /// The byte-string form: raw bytes as stored, or the decimal spelling
    /// of an integer-encoded value.
    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            Str::Raw(bytes) => bytes.clone(),
            Str::Int(v) => v.to_string().into_bytes(),
        }
    }
}

/// Sorted set: the skiplist orders (score, member) pairs, the dict answers
/// ZSCORE in O(1). Both sides always describe the same membership.
pub struct ZSet {
    pub index: Skiplist,
    pub scores: HashMap<Vec<u8>, f64>,
}

impl ZSet {
    pub fn new() -> Self {
        ZSet {
            index: Skiplist::new(),
            scores: HashMap::new(),
        }
    }

    /// Insert or re-score a member. Returns true only for a brand-new
    /// member; a score change repositions the member and returns false.
    pub fn add(&mut self, member: &[u8], score: f64) -> bool {
        match self.scores.get_mut(member) {
            Some(old) => {
                if *old != score {
                    self.index.remove(member, *old);
                    self.index.insert(member.to_vec(), score);
                    *old = score;
                }
                false
            }
            None => {
                self.index.insert(member.to_vec(), score);
                self.scores.insert(member.to_vec(), score);
                true
            }
        }
    }

    /// Remove a member. Returns true if it was present.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.index.remove(member, score);
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.index.rank(member, score)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl Default for ZSet {
    fn default() -> Self {
        ZSet::new()
    }
}

/// The value stored for every key.
pub enum Value {
    Str(Str),
    List(VecDeque<Vec<u8>>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    ZSet(ZSet),
}

impl Value {
    /// Build a string value, preferring the integer encoding when the whole
    /// byte-string parses as a decimal i64 (sign included, no padding).
    pub fn string_from(bytes: &[u8]) -> Value {
        if let Ok(s) = std::str::from_utf8(bytes) {
            if let Ok(v) = s.parse::<i64>() {
                return Value::Str(Str::Int(v));
            }
        }
        Value::Str(Str::Raw(bytes.to_vec()))
    }

    pub fn list() -> Value {
        Value::List(VecDeque::new())
    }

    pub fn hash() -> Value {
        Value::Hash(HashMap::new())
    }

    pub fn set() -> Value {
        Value::Set(HashSet::new())
    }

    pub fn zset() -> Value {
        Value::ZSet(ZSet::new())
    }
}
