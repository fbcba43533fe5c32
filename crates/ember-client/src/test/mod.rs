// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::thread;
use std::time::{Duration, Instant};

use crate::ConnectionManager;

const TICK_INTERVAL: Duration = Duration::from_millis(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Ticks `manager` until `predicate` holds. Returns false if it did not within two seconds.
pub fn tick_until<P>(manager: &mut ConnectionManager, predicate: P) -> bool
where
    P: Fn(&ConnectionManager) -> bool,
{
    tick_until_timeout(manager, DEFAULT_TIMEOUT, predicate)
}

pub fn tick_until_timeout<P>(
    manager: &mut ConnectionManager,
    timeout: Duration,
    predicate: P,
) -> bool
where
    P: Fn(&ConnectionManager) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        manager.tick(TICK_INTERVAL.as_secs_f32());
        if predicate(manager) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(TICK_INTERVAL);
    }
}

/// Ticks `manager` for `duration`.
pub fn tick_for(manager: &mut ConnectionManager, duration: Duration) {
    tick_until_timeout(manager, duration, |_| false);
}
