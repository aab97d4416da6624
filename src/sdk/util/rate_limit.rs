use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::sdk::snapping::provider::ProviderKind;

pub type Limiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

static LIMITERS: OnceLock<Mutex<HashMap<ProviderKind, Limiter>>> = OnceLock::new();

/// One request every `1 / requests_per_second` seconds, no bursts.
pub fn new_limiter(requests_per_second: u32) -> Limiter {
    let rate = requests_per_second.max(1);
    let quota = Quota::with_period(Duration::from_secs_f64(1.0 / rate as f64))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(quota))
}

/// The process-wide limiter for `kind`. Every snapper talking to the same
/// provider shares it, so the quota holds across threads.
pub fn limiter_for(kind: ProviderKind) -> Limiter {
    let registry = LIMITERS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut limiters = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    limiters
        .entry(kind)
        .or_insert_with(|| new_limiter(kind.profile().rate_limit))
        .clone()
}

/// Blocks the calling thread until the limiter admits one more request.
pub fn wait(limiter: &Limiter) {
    futures::executor::block_on(limiter.until_ready());
}
