// Copyright 2024. The Concord Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{collections::HashMap, sync::Arc, time::Duration};

use log::trace;
use tokio::sync::Mutex;

const LOG_TARGET: &str = "concord::consensus::timer";

/// The two FBA timer kinds the driver schedules against (nomination round back-off, ballot round
/// back-off); the library is free to request others but these are the ones the ledger itself
/// reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Nomination,
    Ballot,
}

type TimerKey = (u64, TimerKind);

/// Implements `setup_timer(slot, kind, timeout_ms, callback)`: a newer call for the same
/// `(slot, kind)` supersedes older ones by bumping a watermark; a fired callback checks its id
/// against the watermark and is a no-op if superseded.
#[derive(Clone, Default)]
pub struct TimerRegistry {
    watermarks: Arc<Mutex<HashMap<TimerKey, u64>>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` to run after `timeout_ms` unless superseded. `timeout_ms == 0` cancels
    /// every outstanding timer of that kind without scheduling a new one.
    pub async fn setup_timer<F>(&self, slot: u64, kind: TimerKind, timeout_ms: u64, callback: Option<F>)
    where F: FnOnce() + Send + 'static {
        let key = (slot, kind);
        let id = {
            let mut watermarks = self.watermarks.lock().await;
            let entry = watermarks.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };
        let Some(callback) = callback else {
            trace!(target: LOG_TARGET, "cancelled all timers for {key:?}");
            return;
        };
        if timeout_ms == 0 {
            trace!(target: LOG_TARGET, "cancelled all timers for {key:?}");
            return;
        }
        let watermarks = self.watermarks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            let current = *watermarks.lock().await.get(&key).unwrap_or(&0);
            if current == id {
                callback();
            } else {
                trace!(target: LOG_TARGET, "timer {key:?}#{id} superseded by #{current}, skipping");
            }
        });
    }

    /// Round timeout policy: `min(round_number, 1800)` seconds, linear back-off capped at 30
    /// minutes.
    pub fn round_timeout_ms(round_number: u64) -> u64 {
        round_number.min(1800) * 1000
    }
}
