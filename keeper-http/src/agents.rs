//! Browser identities and proxy pools used to vary outgoing requests.

use rand::Rng;
use rand::seq::SliceRandom;

/// Sent when user-agent rotation is disabled.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DESKTOP_USER_AGENTS: &[&str] = &[
    DEFAULT_USER_AGENT,
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Small pool of plausible desktop browser user agents.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    rotate: bool,
}

impl UserAgentPool {
    pub fn new(rotate: bool) -> Self {
        Self { rotate }
    }

    /// A random desktop UA when rotating, otherwise [`DEFAULT_USER_AGENT`].
    pub fn pick(&self) -> &'static str {
        if !self.rotate {
            return DEFAULT_USER_AGENT;
        }
        let mut rng = rand::thread_rng();
        DESKTOP_USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(DEFAULT_USER_AGENT)
    }
}

/// Split a user-supplied proxy list (`host:port`, comma or newline separated).
///
/// ```
/// use keeper_http::parse_proxy_list;
///
/// let proxies = parse_proxy_list("10.0.0.1:8080, 10.0.0.2:8080\n\n10.0.0.3:3128,");
/// assert_eq!(proxies, vec!["10.0.0.1:8080", "10.0.0.2:8080", "10.0.0.3:3128"]);
/// ```
pub fn parse_proxy_list(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Uniform jitter in `[0.5, 2.0]` seconds added on top of the base delay.
pub(crate) fn jitter_secs() -> f64 {
    rand::thread_rng().gen_range(0.5..=2.0)
}

/// Index into a pool of `len` entries, or `None` when the pool is empty.
pub(crate) fn random_index(len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(rand::thread_rng().gen_range(0..len))
}
