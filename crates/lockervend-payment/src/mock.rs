//! Scripted MDB link for tests and bench runs.
//!
//! The script is a queue of what each successive read returns: a line, or
//! silence. Once the script runs out every read is silent. Every written
//! line is journaled.

use crate::error::{MdbError, Result};
use crate::link::MdbLink;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Script {
    reads: Mutex<VecDeque<Option<String>>>,
    written: Mutex<Vec<String>>,
    disconnected: AtomicBool,
    reopens: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Link answering from a script.
///
/// # Examples
///
/// ```
/// use lockervend_payment::link::MdbLink;
/// use lockervend_payment::mock::ScriptedLink;
///
/// let (mut link, handle) = ScriptedLink::new();
/// handle.push_line("d,STATUS,IDLE");
///
/// link.write_line("D,READER,1").unwrap();
/// assert_eq!(link.read_line().unwrap().as_deref(), Some("d,STATUS,IDLE"));
/// assert_eq!(link.read_line().unwrap(), None);
/// assert_eq!(handle.written(), vec!["D,READER,1"]);
/// ```
#[derive(Debug)]
pub struct ScriptedLink {
    script: Arc<Script>,
}

impl ScriptedLink {
    pub fn new() -> (Self, ScriptedLinkHandle) {
        let script = Arc::new(Script::default());
        (
            Self {
                script: Arc::clone(&script),
            },
            ScriptedLinkHandle { script },
        )
    }
}

impl MdbLink for ScriptedLink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        if self.script.disconnected.load(Ordering::SeqCst) {
            return Err(MdbError::connection("scripted link disconnected"));
        }
        lock(&self.script.written).push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        if self.script.disconnected.load(Ordering::SeqCst) {
            return Err(MdbError::connection("scripted link disconnected"));
        }
        Ok(lock(&self.script.reads).pop_front().flatten())
    }

    fn reopen(&mut self) -> Result<()> {
        self.script.reopens.fetch_add(1, Ordering::SeqCst);
        if self.script.disconnected.load(Ordering::SeqCst) {
            return Err(MdbError::connection("scripted link disconnected"));
        }
        Ok(())
    }
}

/// Handle for scripting and inspecting a [`ScriptedLink`].
#[derive(Debug, Clone)]
pub struct ScriptedLinkHandle {
    script: Arc<Script>,
}

impl ScriptedLinkHandle {
    /// Queue a line for a future read.
    pub fn push_line(&self, line: &str) {
        lock(&self.script.reads).push_back(Some(line.to_string()));
    }

    /// Queue a silent read.
    pub fn push_silence(&self) {
        lock(&self.script.reads).push_back(None);
    }

    /// Queue several lines; `None` entries are silent reads.
    pub fn push_script(&self, script: &[Option<&str>]) {
        let mut reads = lock(&self.script.reads);
        reads.extend(script.iter().map(|line| line.map(str::to_string)));
    }

    /// Make every further operation fail.
    pub fn disconnect(&self) {
        self.script.disconnected.store(true, Ordering::SeqCst);
    }

    /// Every line written so far.
    pub fn written(&self) -> Vec<String> {
        lock(&self.script.written).clone()
    }

    /// How many times `line` was written.
    pub fn count(&self, line: &str) -> usize {
        lock(&self.script.written)
            .iter()
            .filter(|written| written.as_str() == line)
            .count()
    }

    pub fn reopen_count(&self) -> usize {
        self.script.reopens.load(Ordering::SeqCst)
    }

    /// Scripted reads not consumed yet.
    pub fn remaining(&self) -> usize {
        lock(&self.script.reads).len()
    }
}
