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

use std::time::Duration;

use tokio::time;

/// A simple back-off timer: retry a number of times, with the delay growing by `factor` after
/// every attempt. Used when reconnecting to peers or retrying a failed RPC call.
///
/// ```no_run
/// use std::time::Duration;
/// use concord_ledger::BackOff;
///
/// fn attempt(n: u64) -> Result<(), u64> {
///     if n < 3 { Err(n) } else { Ok(()) }
/// }
///
/// async {
///     let mut backoff = BackOff::new(5, Duration::from_millis(100), 1.5);
///     let mut attempts = 1;
///     while !backoff.is_finished() {
///         match attempt(attempts) {
///             Ok(_) => backoff.stop(),
///             Err(_) => {
///                 backoff.wait().await;
///                 attempts += 1;
///             },
///         }
///     }
/// };
/// ```
pub struct BackOff {
    max_attempts: usize,
    current_attempts: usize,
    delay: Duration,
    factor: f64,
    stopped: bool,
}

impl BackOff {
    pub fn new(max_attempts: usize, delay: Duration, factor: f64) -> Self {
        Self { max_attempts, current_attempts: 0, delay, factor, stopped: false }
    }

    pub fn attempts(&self) -> usize {
        self.current_attempts
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn is_finished(&self) -> bool {
        self.current_attempts >= self.max_attempts || self.stopped
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub async fn wait(&mut self) {
        if self.is_finished() {
            return;
        }
        time::sleep(self.delay).await;
        self.current_attempts += 1;
        self.delay = self.delay.mul_f64(self.factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retry_stops_after_max_attempts() {
        let mut backoff = BackOff::new(3, Duration::from_millis(10), 1.5);
        assert_eq!(backoff.attempts(), 0);
        backoff.wait().await;
        backoff.wait().await;
        backoff.wait().await;
        assert!(backoff.is_finished());
        backoff.wait().await;
        assert_eq!(backoff.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_retry_loop_early() {
        let mut backoff = BackOff::new(10, Duration::from_millis(10), 2.0);
        backoff.wait().await;
        backoff.stop();
        assert!(backoff.is_finished());
        assert_eq!(backoff.attempts(), 1);
    }
}
