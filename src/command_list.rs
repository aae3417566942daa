//! Ordered command sequence with incrementally maintained totals
//!
//! Every mutation adjusts the cached byte length and sample counts by the
//! contribution of the commands entering or leaving the list. There is no
//! mutable indexing, so the caches cannot be bypassed.
//!
//! The loop point is a position in the stream: the start of the command at
//! `loop_index`, or the end of the stream when `loop_index == len()`. Commands
//! inserted exactly at the loop point become part of the loop.

use crate::errors::{VgmError, VgmResult};
use crate::vgm_commands::Command;
use std::ops::{Bound, Index, RangeBounds};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandList {
    commands: Vec<Command>,
    byte_length: usize,
    total_samples: u64,
    loop_index: Option<usize>,
    loop_samples: u64,
    /// Bytes of the commands before the loop point
    loop_byte_offset: usize,
}

/// Byte and sample contribution of a run of commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    bytes: usize,
    samples: u64,
}

impl Tally {
    fn of<'a>(commands: impl IntoIterator<Item = &'a Command>) -> Tally {
        commands.into_iter().fold(Tally::default(), |acc, c| Tally {
            bytes: acc.bytes + c.size(),
            samples: acc.samples + c.samples(),
        })
    }
}

fn index_error(field: &'static str, value: usize, max: usize) -> VgmError {
    VgmError::InvalidRange {
        field,
        value: value as u64,
        min: 0,
        max: max as u64,
    }
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of decoded commands, counting them once.
    pub fn from_commands(commands: Vec<Command>, loop_index: Option<usize>) -> VgmResult<Self> {
        let tally = Tally::of(&commands);
        let mut list = CommandList {
            commands,
            byte_length: tally.bytes,
            total_samples: tally.samples,
            ..Default::default()
        };
        list.set_loop_index(loop_index)?;
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn last(&self) -> Option<&Command> {
        self.commands.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn as_slice(&self) -> &[Command] {
        &self.commands
    }

    /// Encoded size of the whole stream
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn loop_index(&self) -> Option<usize> {
        self.loop_index
    }

    /// Samples from the loop point to the end, 0 without a loop
    pub fn loop_samples(&self) -> u64 {
        self.loop_samples
    }

    /// Offset of the loop point from the start of the stream
    pub fn loop_byte_offset(&self) -> Option<usize> {
        self.loop_index.map(|_| self.loop_byte_offset)
    }

    /// Move the loop point; `None` removes it. Counts are rebuilt for the new position.
    pub fn set_loop_index(&mut self, loop_index: Option<usize>) -> VgmResult<()> {
        match loop_index {
            Some(index) if index > self.commands.len() => {
                return Err(index_error("loop_index", index, self.commands.len()))
            }
            Some(index) => {
                let before = Tally::of(&self.commands[..index]);
                self.loop_byte_offset = before.bytes;
                self.loop_samples = self.total_samples - before.samples;
            }
            None => {
                self.loop_byte_offset = 0;
                self.loop_samples = 0;
            }
        }
        self.loop_index = loop_index;
        Ok(())
    }

    fn add(&mut self, tally: Tally, in_loop: bool) {
        self.byte_length += tally.bytes;
        self.total_samples += tally.samples;
        if self.loop_index.is_some() {
            if in_loop {
                self.loop_samples += tally.samples;
            } else {
                self.loop_byte_offset += tally.bytes;
            }
        }
    }

    fn subtract(&mut self, tally: Tally, in_loop: bool) {
        self.byte_length -= tally.bytes;
        self.total_samples -= tally.samples;
        if self.loop_index.is_some() {
            if in_loop {
                self.loop_samples -= tally.samples;
            } else {
                self.loop_byte_offset -= tally.bytes;
            }
        }
    }

    pub fn push(&mut self, command: Command) {
        self.add(Tally::of([&command]), true);
        self.commands.push(command);
    }

    pub fn pop(&mut self) -> Option<Command> {
        let index = self.commands.len().checked_sub(1)?;
        self.remove(index).ok()
    }

    pub fn insert(&mut self, index: usize, command: Command) -> VgmResult<()> {
        if index > self.commands.len() {
            return Err(index_error("index", index, self.commands.len()));
        }
        let in_loop = self.loop_index.map_or(true, |l| index >= l);
        self.add(Tally::of([&command]), in_loop);
        if let Some(l) = self.loop_index.as_mut() {
            if index < *l {
                *l += 1;
            }
        }
        self.commands.insert(index, command);
        Ok(())
    }

    /// Remove one command. Removing the command at the loop point keeps the
    /// loop starting at the command that follows it.
    pub fn remove(&mut self, index: usize) -> VgmResult<Command> {
        if index >= self.commands.len() {
            return Err(index_error(
                "index",
                index,
                self.commands.len().saturating_sub(1),
            ));
        }
        let command = self.commands.remove(index);
        let in_loop = self.loop_index.map_or(true, |l| index >= l);
        self.subtract(Tally::of([&command]), in_loop);
        if let Some(l) = self.loop_index.as_mut() {
            if index < *l {
                *l -= 1;
            }
        }
        Ok(command)
    }

    /// Swap one command for another in place; the loop point stays put.
    pub fn replace(&mut self, index: usize, command: Command) -> VgmResult<Command> {
        if index >= self.commands.len() {
            return Err(index_error(
                "index",
                index,
                self.commands.len().saturating_sub(1),
            ));
        }
        let in_loop = self.loop_index.map_or(true, |l| index >= l);
        self.add(Tally::of([&command]), in_loop);
        let old = std::mem::replace(&mut self.commands[index], command);
        self.subtract(Tally::of([&old]), in_loop);
        Ok(old)
    }

    /// Replace `range` with `items`, returning the removed commands.
    ///
    /// Behaves like removing the range and inserting the items one by one at
    /// its start: a loop point inside or at the end of the range ends up at the
    /// first inserted command.
    pub fn splice<R, I>(&mut self, range: R, items: I) -> VgmResult<Vec<Command>>
    where
        R: RangeBounds<usize>,
        I: IntoIterator<Item = Command>,
    {
        let len = self.commands.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => e + 1,
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        };
        if end > len {
            return Err(index_error("range.end", end, len));
        }
        if start > end {
            return Err(index_error("range.start", start, end));
        }

        let items: Vec<Command> = items.into_iter().collect();
        let inserted = Tally::of(&items);
        let inserted_count = items.len();
        let removed: Vec<Command> = self.commands.splice(start..end, items).collect();

        match self.loop_index {
            Some(l) if l > end => {
                self.subtract(Tally::of(&removed), false);
                self.add(inserted, false);
                self.loop_index = Some(l - removed.len() + inserted_count);
            }
            Some(l) if l > start => {
                let (before, after) = removed.split_at(l - start);
                self.subtract(Tally::of(before), false);
                self.subtract(Tally::of(after), true);
                self.add(inserted, true);
                self.loop_index = Some(start);
            }
            _ => {
                self.subtract(Tally::of(&removed), true);
                self.add(inserted, true);
            }
        }
        Ok(removed)
    }

    pub fn extend<I: IntoIterator<Item = Command>>(&mut self, items: I) {
        for command in items {
            self.push(command);
        }
    }

    /// Keep the first `len` commands. A loop point past the cut moves to the new end.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.commands.len() {
            return;
        }
        let removed: Vec<Command> = self.commands.drain(len..).collect();
        match self.loop_index {
            Some(l) if l > len => {
                let (before, after) = removed.split_at(l - len);
                self.subtract(Tally::of(before), false);
                self.subtract(Tally::of(after), true);
                self.loop_index = Some(len);
            }
            _ => self.subtract(Tally::of(&removed), true),
        }
    }

    /// Remove every command and the loop point
    pub fn clear(&mut self) {
        *self = CommandList::default();
    }
}

impl Index<usize> for CommandList {
    type Output = Command;

    fn index(&self, index: usize) -> &Command {
        &self.commands[index]
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

impl FromIterator<Command> for CommandList {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        let mut list = CommandList::new();
        list.extend(iter);
        list
    }
}
