// This file is part of spool, a stackful coroutine runtime with
// cooperative state checkpointing.
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Cooperative state checkpointing.
//!
//! A coroutine body can enrol named values with a [`CheckpointState`]; when
//! the state was constructed over a previously stored stream, each enrolment
//! picks up its persisted value instead of its initial one, letting a fresh
//! coroutine fast-forward past work already done in an earlier run (or an
//! earlier process).
//!
//! The stream is a flat sequence of `name SEP value SEP` records, where SEP
//! is the three-byte sequence `\n\n\n`. Names and encoded values must not
//! contain three consecutive newlines; the built-in [`SaveValue`]
//! implementations never produce any.

use std::any::Any;
use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::str;

use log::{debug, warn};

/// The record separator of the checkpoint stream.
pub const SEPARATOR: &[u8] = b"\n\n\n";

/// A value that can cross a checkpoint: written as implementation-defined
/// text (decimal for integers, `true`/`false` for booleans) and parsed back.
///
/// The encoded form must not contain three consecutive newline bytes.
pub trait SaveValue: Sized + 'static {
    /// Writes the textual encoding of `self`.
    fn save(&self, out: &mut dyn Write) -> io::Result<()>;
    /// Parses a value back from its textual encoding. `None` on malformed
    /// input, in which case the enrolment falls back to its initial value.
    fn restore(bytes: &[u8]) -> Option<Self>;
}

macro_rules! save_value_via_text {
    ($($ty:ty),* $(,)?) => {$(
        impl SaveValue for $ty {
            fn save(&self, out: &mut dyn Write) -> io::Result<()> {
                write!(out, "{}", self)
            }
            fn restore(bytes: &[u8]) -> Option<Self> {
                str::from_utf8(bytes).ok()?.parse().ok()
            }
        }
    )*};
}

save_value_via_text! {
    bool, char,
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    f32, f64,
    String,
}

/// Type-erased ledger entry payload.
trait StoredValue {
    fn save(&self, out: &mut dyn Write) -> io::Result<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: SaveValue> StoredValue for T {
    fn save(&self, out: &mut dyn Write) -> io::Result<()> {
        SaveValue::save(self, out)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct LedgerEntry {
    seq: u64,
    name: String,
    value: Box<dyn StoredValue>,
}

/// Live enrolments in insertion order, keyed by a monotonically increasing
/// sequence number so that entries can be removed in any order.
#[derive(Default)]
struct Ledger {
    entries: Vec<LedgerEntry>,
    next_seq: u64,
}

impl Ledger {
    fn insert(&mut self, name: String, value: Box<dyn StoredValue>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(LedgerEntry { seq, name, value });
        seq
    }

    fn position(&self, seq: u64) -> usize {
        self.entries
            .binary_search_by_key(&seq, |entry| entry.seq)
            .expect("enrolment is live")
    }

    fn remove(&mut self, seq: u64) {
        let index = self.position(seq);
        self.entries.remove(index);
    }
}

/// Forward-only reader over the persisted record stream.
struct RecordReader<'i> {
    bytes: io::Bytes<Box<dyn Read + 'i>>,
    eof: bool,
}

impl RecordReader<'_> {
    /// Reads one separator-terminated token. `None` once the stream is
    /// exhausted; a trailing partial record counts as exhaustion.
    fn next_token(&mut self) -> Option<Vec<u8>> {
        if self.eof {
            return None;
        }
        let mut token = Vec::new();
        let mut newlines = 0;
        loop {
            match self.bytes.next() {
                None => {
                    self.eof = true;
                    return None;
                }
                Some(Err(error)) => {
                    self.eof = true;
                    warn!("checkpoint: read error, treating as end of stream: {error}");
                    return None;
                }
                Some(Ok(b'\n')) => {
                    newlines += 1;
                    if newlines == SEPARATOR.len() {
                        return Some(token);
                    }
                }
                Some(Ok(byte)) => {
                    for _ in 0..newlines {
                        token.push(b'\n');
                    }
                    newlines = 0;
                    token.push(byte);
                }
            }
        }
    }
}

/// Restorable state shared between a caller and the coroutines it drives.
///
/// Constructed over an input stream of previously stored records (possibly
/// empty). A coroutine body [`enrol`](CheckpointState::enrol)s named values;
/// the caller may [`store`](CheckpointState::store) the live set to an output
/// stream at any suspension point. Feeding that output back into a fresh
/// `CheckpointState` rehydrates the same enrolments in a fresh coroutine.
///
/// The input is consumed strictly forwards, so enrolments must occur in the
/// order their records were stored; save and restore both traverse the body's
/// lexical order, so the orders match in practice.
///
/// # Example
///
/// ```
/// use spool::CheckpointState;
///
/// let state = CheckpointState::new(std::io::empty());
/// let mut out = Vec::new();
/// {
///     let steps = state.enrol("steps", 0u32);
///     steps.set(7);
///     state.store(&mut out).unwrap();
/// }
/// assert_eq!(out, b"steps\n\n\n7\n\n\n");
///
/// let restored = CheckpointState::new(&out[..]);
/// let steps = restored.enrol("steps", 0u32);
/// assert_eq!(steps.get(), 7);
/// ```
pub struct CheckpointState<'i> {
    input: RefCell<RecordReader<'i>>,
    ledger: RefCell<Ledger>,
}

impl<'i> CheckpointState<'i> {
    /// Creates a checkpoint state reading previously stored records from
    /// `input`.
    pub fn new<R: Read + 'i>(input: R) -> CheckpointState<'i> {
        CheckpointState {
            input: RefCell::new(RecordReader {
                bytes: (Box::new(input) as Box<dyn Read + 'i>).bytes(),
                eof: false,
            }),
            ledger: RefCell::new(Ledger::default()),
        }
    }

    /// Scans forward for a record named `name`; consumes the stream up to
    /// and including the record it stops at.
    fn lookup<T: SaveValue>(&self, name: &str) -> Option<T> {
        let mut input = self.input.borrow_mut();
        loop {
            let candidate = input.next_token()?;
            if candidate == name.as_bytes() {
                let bytes = input.next_token()?;
                return match T::restore(&bytes) {
                    Some(value) => Some(value),
                    None => {
                        debug!("checkpoint: record `{name}` failed to parse, using the initial value");
                        None
                    }
                };
            }
            // Skip the mismatched record's value region.
            input.next_token()?;
        }
    }

    /// Enrols a named value for the current scope.
    ///
    /// If the input stream holds a record named `name`, the value is
    /// restored from it; otherwise `initial` is used. The enrolment stays in
    /// the live set until the returned guard is dropped; a
    /// [`store`](CheckpointState::store) in between persists it. Dropping the
    /// guard without storing loses the value, intentionally.
    pub fn enrol<T: SaveValue>(&self, name: &str, initial: T) -> Saved<'_, 'i, T> {
        let value = match self.lookup::<T>(name) {
            Some(value) => {
                debug!("checkpoint: restored `{name}`");
                value
            }
            None => {
                debug!("checkpoint: no stored value for `{name}`");
                initial
            }
        };
        let seq = self.ledger.borrow_mut().insert(name.to_owned(), Box::new(value));
        Saved {
            state: self,
            seq,
            _value: PhantomData,
        }
    }

    /// Writes every live enrolment, in enrolment order, as
    /// `name SEP value SEP`. Write errors propagate; the stream may be left
    /// partially written.
    pub fn store(&self, out: &mut dyn Write) -> io::Result<()> {
        let ledger = self.ledger.borrow();
        for entry in &ledger.entries {
            out.write_all(entry.name.as_bytes())?;
            out.write_all(SEPARATOR)?;
            entry.value.save(out)?;
            out.write_all(SEPARATOR)?;
        }
        debug!("checkpoint: stored {} records", ledger.entries.len());
        Ok(())
    }

    /// Runs `body` unless a stored checkpoint says it already ran.
    ///
    /// A boolean is enrolled under a name derived from `site` (which must be
    /// unique per lexical occurrence; the [`run_once!`](crate::run_once)
    /// macro derives one from the source location). The flag is cleared
    /// *before* `body` runs, so a checkpoint taken while `body` is suspended
    /// already records the block as done, and a later rerun skips it even
    /// though enrolments made outside the block are re-enrolled.
    pub fn run_once<F: FnOnce()>(&self, site: &str, body: F) {
        let flag = self.enrol(&format!("_run_once_{site}"), true);
        if flag.get() {
            flag.set(false);
            body();
        }
    }
}

/// A scope guard for one enrolled value; created by
/// [`CheckpointState::enrol`] and unenrolled on drop.
///
/// The value itself lives in the checkpoint ledger; the guard reads and
/// writes it through [`get`](Saved::get), [`set`](Saved::set) and
/// [`update`](Saved::update).
pub struct Saved<'s, 'i, T: SaveValue> {
    state: &'s CheckpointState<'i>,
    seq: u64,
    _value: PhantomData<T>,
}

impl<T: SaveValue> Saved<'_, '_, T> {
    /// Returns a copy of the enrolled value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        let ledger = self.state.ledger.borrow();
        let index = ledger.position(self.seq);
        ledger.entries[index]
            .value
            .as_any()
            .downcast_ref::<T>()
            .expect("enrolment type")
            .clone()
    }

    /// Replaces the enrolled value.
    pub fn set(&self, value: T) {
        self.update(|slot| *slot = value)
    }

    /// Reads and writes the enrolled value in place. The callback must not
    /// touch the checkpoint state: the ledger is borrowed for its duration.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut ledger = self.state.ledger.borrow_mut();
        let index = ledger.position(self.seq);
        let slot = ledger.entries[index]
            .value
            .as_any_mut()
            .downcast_mut::<T>()
            .expect("enrolment type");
        f(slot)
    }
}

impl<T: SaveValue> Drop for Saved<'_, '_, T> {
    fn drop(&mut self) {
        self.state.ledger.borrow_mut().remove(self.seq);
    }
}
