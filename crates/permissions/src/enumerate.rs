//! Bounded-buffer enumeration.
//!
//! An enumeration pass covers the elements that existed when it started:
//! the count is captured once, and each step materializes at most one
//! batch. If the view shrinks during the pass, the missing tail is skipped;
//! elements added during the pass are left for the next one.

use crate::error::{Error, Result};
use crate::results::PermissionResults;
use crate::value::PermissionValue;
use std::collections::VecDeque;

/// A single pass over a view, one batch at a time.
pub struct Enumerator<'a> {
    view: &'a PermissionResults,
    snapshot: usize,
    position: usize,
    batch: usize,
}

impl<'a> Enumerator<'a> {
    pub(crate) fn new(view: &'a PermissionResults, batch: usize) -> Result<Self> {
        Ok(Self {
            view,
            snapshot: view.count()?,
            position: 0,
            batch: batch.max(1),
        })
    }

    /// Returns true once every element of the snapshot has been visited.
    pub fn is_done(&self) -> bool {
        self.position >= self.snapshot
    }

    /// Replaces the contents of `buffer` with the next batch.
    ///
    /// Returns the number of values written; zero means the pass is over.
    pub fn next_batch(&mut self, buffer: &mut Vec<PermissionValue>) -> Result<usize> {
        buffer.clear();
        if self.is_done() {
            return Ok(0);
        }
        let end = self.snapshot.min(self.view.count()?);
        while self.position < end && buffer.len() < self.batch {
            match self.view.at(self.position) {
                Ok(value) => buffer.push(value),
                // Shrunk since the count above
                Err(Error::OutOfRange { .. }) => break,
                Err(err) => return Err(err),
            }
            self.position += 1;
        }
        if buffer.is_empty() {
            self.position = self.snapshot;
        }
        Ok(buffer.len())
    }
}

/// Iterator over a view, backed by an [`Enumerator`].
///
/// The snapshot is taken on the first call to `next`. A failure is yielded
/// once and ends the iteration.
pub struct Iter<'a> {
    view: &'a PermissionResults,
    enumerator: Option<Enumerator<'a>>,
    buffer: VecDeque<PermissionValue>,
    scratch: Vec<PermissionValue>,
    finished: bool,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(view: &'a PermissionResults) -> Self {
        Self {
            view,
            enumerator: None,
            buffer: VecDeque::new(),
            scratch: Vec::new(),
            finished: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        if self.enumerator.is_none() {
            self.enumerator = Some(self.view.enumerate()?);
        }
        let Some(enumerator) = self.enumerator.as_mut() else {
            return Ok(());
        };
        if enumerator.next_batch(&mut self.scratch)? == 0 {
            self.finished = true;
        }
        self.buffer.extend(self.scratch.drain(..));
        Ok(())
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<PermissionValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.finished {
            if let Err(err) = self.fill() {
                self.finished = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
