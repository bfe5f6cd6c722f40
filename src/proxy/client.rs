use std::time::Duration;

/// Outbound client shared by the forwarder and the fal media client.
///
/// `timeout` bounds the whole exchange; there is no retry layer on top.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(32)
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(timeout)
        .build()
}
