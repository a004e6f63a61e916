use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// HTTP client options shared by all fetches of an engine instance.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall timeout for a single request.
    pub request_timeout: Duration,
    /// Connection timeout (time to establish the initial connection).
    pub connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

/// Backoff behavior for transient per-request failures (network errors,
/// 5xx). Recovery rounds are a separate, coordinator-level budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay; actual delay = base * 2^attempt + jitter.
    pub base_delay: Duration,
    /// Hard cap on the computed delay.
    pub max_delay: Duration,
    /// Adds random jitter of [0, base_delay/2) to avoid thundering herd.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

/// Segment fetch pipeline configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Max simultaneous in-flight segment fetches.
    pub concurrency: usize,
    /// Minimum spacing before issuing each new fetch (politeness throttle).
    pub delay: Duration,
    /// Transient-failure retry policy for individual requests.
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            delay: Duration::ZERO,
            retry: RetryPolicy::default(),
        }
    }
}

/// Recovery coordinator configuration.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Retry-round budget. Converts "retry forever" into "fail fast with a
    /// clear terminal state" when upstream segments are permanently dead.
    pub max_retry_rounds: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retry_rounds: 3,
        }
    }
}

/// Batch runner configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Tasks pulled from the source per cycle.
    pub batch_size: usize,
    /// Sleep between polls when the source has nothing pending.
    pub check_interval: Duration,
    /// Cooldown after each processed task.
    pub cooldown: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            check_interval: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Aggregated engine configuration. Immutable once handed to the engine;
/// concurrent workers each hold their own copy, nothing is read from
/// ambient state.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub http: HttpConfig,
    pub fetch: FetchConfig,
    pub recovery: RecoveryConfig,
    pub batch: BatchConfig,
}
