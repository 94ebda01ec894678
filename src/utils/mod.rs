//! Utility functions module

use crate::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;

/// HTTP client builder
pub struct HttpClientBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    pool_max_idle_per_host: usize,
    user_agent: String,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 4,
            user_agent: format!("DashDocsMCP/{}", crate::VERSION),
        }
    }
}

impl HttpClientBuilder {
    /// Create a new HTTP client builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connection timeout
    #[must_use]
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Set connection pool size
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Set User-Agent
    #[must_use]
    pub fn user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Build HTTP client
    pub fn build(self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| Error::Initialization(format!("HTTP 客户端创建失败: {e}")))
    }
}

/// String utilities
pub mod string {
    /// Truncate string and add ellipsis
    #[must_use]
    pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
        if s.len() <= max_len {
            return s.to_string();
        }

        if max_len <= 3 {
            return "...".to_string();
        }

        let mut cut = max_len - 3;
        // 避免切在多字节字符中间
        while cut > 0 && !s.is_char_boundary(cut) {
            cut -= 1;
        }

        format!("{}...", &s[..cut])
    }

    /// Check if string is empty or blank
    #[must_use]
    pub fn is_blank(s: &str) -> bool {
        s.trim().is_empty()
    }
}

/// Validation utilities
pub mod validation {
    use super::string;
    use crate::error::Error;

    /// 校验搜索查询
    pub fn validate_query(query: &str) -> Result<(), Error> {
        if string::is_blank(query) {
            return Err(Error::Validation("搜索查询不能为空".to_string()));
        }

        if query.len() > 500 {
            return Err(Error::Validation("搜索查询过长".to_string()));
        }

        Ok(())
    }

    /// 校验 docset 标识符
    pub fn validate_identifier(identifier: &str) -> Result<(), Error> {
        if string::is_blank(identifier) {
            return Err(Error::Validation(
                "docset 标识符不能为空，请先调用 list_installed_docsets 获取标识符".to_string(),
            ));
        }

        Ok(())
    }

    /// 校验结果数量上限
    pub fn validate_max_results(max_results: u32) -> Result<(), Error> {
        if !(1..=1000).contains(&max_results) {
            return Err(Error::Validation(
                "max_results 必须在 1 到 1000 之间".to_string(),
            ));
        }

        Ok(())
    }
}

/// Token budget estimation
///
/// 粗略估算：约 4 个字符折算 1 个 token。
pub mod tokens {
    /// 响应结构自身占用的基础 token 开销
    const BASE_OVERHEAD: usize = 100;

    /// Estimate tokens for a plain string
    #[must_use]
    pub fn estimate_str(s: &str) -> usize {
        (s.len() / 4).max(1)
    }

    /// Estimate tokens for a serialized JSON value
    #[must_use]
    pub fn estimate_value(value: &serde_json::Value) -> usize {
        match value {
            serde_json::Value::Null | serde_json::Value::Bool(_) => 1,
            serde_json::Value::Number(n) => estimate_str(&n.to_string()),
            serde_json::Value::String(s) => estimate_str(s),
            serde_json::Value::Array(items) => {
                items.iter().map(estimate_value).sum::<usize>().max(1)
            }
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| estimate_str(k) + estimate_value(v))
                .sum::<usize>()
                .max(1),
        }
    }

    /// Keep the leading items that fit within the token budget.
    /// Returns the kept prefix and whether anything was dropped.
    pub fn take_within_budget<T: serde::Serialize>(items: Vec<T>, budget: usize) -> (Vec<T>, bool) {
        let total = items.len();
        let mut used = BASE_OVERHEAD;
        let mut kept = Vec::with_capacity(total);

        for item in items {
            let cost = serde_json::to_value(&item)
                .map(|v| estimate_value(&v))
                .unwrap_or(1);
            if used + cost > budget {
                break;
            }
            used += cost;
            kept.push(item);
        }

        let truncated = kept.len() < total;
        (kept, truncated)
    }
}

/// Performance monitoring
pub mod metrics {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    /// Performance counter
    #[derive(Clone)]
    pub struct PerformanceCounter {
        total_requests: Arc<AtomicU64>,
        successful_requests: Arc<AtomicU64>,
        failed_requests: Arc<AtomicU64>,
        total_response_time_ms: Arc<AtomicU64>,
    }

    impl PerformanceCounter {
        /// Create a new performance counter
        #[must_use]
        pub fn new() -> Self {
            Self {
                total_requests: Arc::new(AtomicU64::new(0)),
                successful_requests: Arc::new(AtomicU64::new(0)),
                failed_requests: Arc::new(AtomicU64::new(0)),
                total_response_time_ms: Arc::new(AtomicU64::new(0)),
            }
        }

        /// Record request start
        #[must_use]
        pub fn record_request_start(&self) -> Instant {
            self.total_requests.fetch_add(1, Ordering::Relaxed);
            Instant::now()
        }

        /// Record request completion
        #[allow(clippy::cast_possible_truncation)]
        pub fn record_request_complete(&self, start: Instant, success: bool) {
            let duration_ms = start.elapsed().as_millis() as u64;
            self.total_response_time_ms
                .fetch_add(duration_ms, Ordering::Relaxed);

            if success {
                self.successful_requests.fetch_add(1, Ordering::Relaxed);
            } else {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
            }
        }

        /// Get statistics
        #[must_use]
        pub fn get_stats(&self) -> PerformanceStats {
            let total = self.total_requests.load(Ordering::Relaxed);
            let success = self.successful_requests.load(Ordering::Relaxed);
            let failed = self.failed_requests.load(Ordering::Relaxed);
            let total_time = self.total_response_time_ms.load(Ordering::Relaxed);

            #[allow(clippy::cast_precision_loss)]
            let avg_response_time = if total > 0 {
                total_time as f64 / total as f64
            } else {
                0.0
            };

            #[allow(clippy::cast_precision_loss)]
            let success_rate = if total > 0 {
                success as f64 / total as f64 * 100.0
            } else {
                0.0
            };

            PerformanceStats {
                total_requests: total,
                successful_requests: success,
                failed_requests: failed,
                average_response_time_ms: avg_response_time,
                success_rate_percent: success_rate,
            }
        }

        /// Reset counter
        pub fn reset(&self) {
            self.total_requests.store(0, Ordering::Relaxed);
            self.successful_requests.store(0, Ordering::Relaxed);
            self.failed_requests.store(0, Ordering::Relaxed);
            self.total_response_time_ms.store(0, Ordering::Relaxed);
        }
    }

    impl Default for PerformanceCounter {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Performance statistics
    #[derive(Debug, Clone, serde::Serialize)]
    pub struct PerformanceStats {
        /// Total requests
        pub total_requests: u64,
        /// Successful requests
        pub successful_requests: u64,
        /// Failed requests
        pub failed_requests: u64,
        /// Average response time (milliseconds)
        pub average_response_time_ms: f64,
        /// Success rate (percentage)
        pub success_rate_percent: f64,
    }
}
