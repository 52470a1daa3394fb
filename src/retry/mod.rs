// Copyright 2017 CoreOS, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drive a function through a finite number of retries until it succeeds.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use slog_scope::debug;

#[derive(Clone, Debug)]
pub struct Retry {
    initial_backoff: Duration,
    max_backoff: Duration,
    max_retries: u8,
}

impl Default for Retry {
    fn default() -> Self {
        Retry {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

impl Retry {
    /// Build a new retrying driver.
    ///
    /// This defaults to 3 retries, starting at half a second of backoff and
    /// doubling up to 5 seconds.
    pub fn new() -> Self {
        Retry::default()
    }

    /// Set the initial backoff.
    #[cfg(test)]
    pub fn initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Set the maximum backoff.
    #[cfg(test)]
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Maximum number of retries to attempt.
    ///
    /// If zero, only the initial run will be performed.
    pub fn max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Run `try_fn` until it succeeds once or runs out of retries.
    ///
    /// The closure receives the zero-based attempt number.
    pub fn retry<F, R>(self, try_fn: F) -> Result<R>
    where
        F: Fn(u8) -> Result<R>,
    {
        let mut delay = self.initial_backoff;
        let mut attempt = 0;

        loop {
            let err = match try_fn(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if attempt >= self.max_retries {
                return Err(err).with_context(|| {
                    format!("maximum number of retries ({}) reached", self.max_retries)
                });
            }
            debug!("attempt #{} failed, retrying in {:?}: {:#}", attempt + 1, delay, err);
            attempt = attempt.saturating_add(1);

            thread::sleep(delay);
            delay = std::cmp::min(delay.saturating_mul(2), self.max_backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::Cell;

    type AttemptResult = Result<u8>;

    fn fast_driver(retries: u8) -> Retry {
        let timings = Duration::from_millis(10);
        Retry::new()
            .initial_backoff(timings)
            .max_backoff(timings)
            .max_retries(retries)
    }

    #[test]
    fn test_no_retries() {
        let final_res: AttemptResult = fast_driver(0).retry(|attempt| {
            if attempt != 0 {
                panic!("unreachable attempt {attempt}");
            }

            bail!("expected error")
        });
        final_res.unwrap_err();
    }

    #[test]
    fn test_max_retries() {
        let retries = 3;
        let final_res = fast_driver(retries).retry(|attempt| {
            if attempt == retries {
                return AttemptResult::Ok(attempt);
            }
            if attempt > retries {
                panic!("unreachable attempt {attempt}");
            }

            bail!("expected error #{}", attempt)
        });
        assert_eq!(final_res.unwrap(), retries);
    }

    #[test]
    fn test_exhausted_retries() {
        let calls = Cell::new(0u8);
        let final_res: AttemptResult = fast_driver(2).retry(|_| {
            calls.set(calls.get() + 1);
            bail!("mount failed")
        });
        let err = final_res.unwrap_err();
        assert_eq!(calls.get(), 3);
        assert!(format!("{err:#}").contains("mount failed"));
    }
}
