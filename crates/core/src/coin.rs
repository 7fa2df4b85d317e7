// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::atomic::{AtomicBool, Ordering};

/// A one-shot atomic flag: the first caller to [`spend`](Self::spend) gets
/// `true`, every other caller (concurrent or subsequent) gets `false`.
///
/// Used to make build teardown idempotent without a mutex-guarded boolean
/// sprinkled across call sites.
#[derive(Debug, Default)]
pub struct SingleUseCoin {
    spent: AtomicBool,
}

impl SingleUseCoin {
    pub fn new() -> Self {
        Self {
            spent: AtomicBool::new(false),
        }
    }

    /// Attempts to spend the coin. Returns `true` exactly once across the
    /// coin's lifetime, regardless of concurrent callers.
    pub fn spend(&self) -> bool {
        self.spent
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_spent(&self) -> bool {
        self.spent.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn only_one_spend_succeeds() {
        let coin = SingleUseCoin::new();
        assert!(coin.spend());
        assert!(!coin.spend());
        assert!(!coin.spend());
        assert!(coin.is_spent());
    }

    #[tokio::test]
    async fn only_one_spend_succeeds_under_concurrency() {
        let coin = Arc::new(SingleUseCoin::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let coin = coin.clone();
            handles.push(tokio::spawn(async move { coin.spend() }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
