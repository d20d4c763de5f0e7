//! Heartbeat endpoint handler.
//!
//! Returns server status information, including uptime, memory usage, the
//! scene on display and scene cache counters.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::state::AppState;

/// Random server ID, fixed for the lifetime of the process
static SERVER_ID: once_cell::sync::Lazy<String> = once_cell::sync::Lazy::new(|| {
    Uuid::new_v4().to_string()
});

/// Server start time
static START_TIME: once_cell::sync::Lazy<SystemTime> = once_cell::sync::Lazy::new(|| {
    SystemTime::now()
});

/// Heartbeat response structure
#[derive(Serialize)]
pub struct HeartbeatResponse {
    /// Server ID (unique per instance)
    pub server_id: String,
    /// Current timestamp (ISO 8601 format)
    pub timestamp: String,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Process memory usage in bytes
    pub memory_usage_bytes: Option<u64>,
    /// Available system memory in bytes
    pub available_memory_bytes: Option<u64>,
    /// Scene on display
    pub scene: SceneInfo,
    /// Scene cache counters
    pub cache: CacheStats,
    /// Server status
    pub status: String,
}

/// Scene information structure
#[derive(Serialize)]
pub struct SceneInfo {
    /// File name, or "upload"
    pub source: String,
    pub rows: usize,
    pub cols: usize,
    /// Approximate memory held by the scene's grids in bytes
    pub memory_bytes: usize,
    /// When the scene was built (ISO 8601 format)
    pub loaded_at: String,
}

/// Handle GET /heartbeat requests
pub async fn heartbeat_handler(State(state): State<Arc<AppState>>) -> Json<HeartbeatResponse> {
    let now = SystemTime::now();
    let timestamp = chrono::DateTime::<chrono::Utc>::from(now)
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    let uptime = now.duration_since(*START_TIME).unwrap_or(Duration::from_secs(0));

    let response = HeartbeatResponse {
        server_id: SERVER_ID.clone(),
        timestamp,
        uptime_seconds: uptime.as_secs(),
        memory_usage_bytes: get_memory_usage(),
        available_memory_bytes: get_available_memory(),
        scene: scene_info(&state),
        cache: state.cache.stats(),
        status: "healthy".to_string(),
    };

    Json(response)
}

fn scene_info(state: &AppState) -> SceneInfo {
    let scene = state.scene();
    let (rows, cols) = scene.raster.shape();
    SceneInfo {
        source: scene.raster.source.clone(),
        rows,
        cols,
        memory_bytes: scene.memory_bytes(),
        loaded_at: scene
            .loaded_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }
}

/// Resident set size of this process in bytes
fn get_memory_usage() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        // Second field of statm is the resident page count
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(pages * 4096)
    }

    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("ps")
            .args(["-o", "rss=", "-p", &std::process::id().to_string()])
            .output()
            .ok()?;
        let rss_kb: u64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
        Some(rss_kb * 1024)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

/// Memory available to new processes in bytes (Linux only)
fn get_available_memory() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        meminfo_kb(&meminfo, "MemAvailable:").map(|kb| kb * 1024)
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
fn meminfo_kb(meminfo: &str, key: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|line| line.starts_with(key))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{get, json, test_state};
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_meminfo_parsing() {
        let meminfo = "MemTotal:       16314244 kB\nMemAvailable:    9870112 kB\n";
        assert_eq!(meminfo_kb(meminfo, "MemAvailable:"), Some(9_870_112));
        assert_eq!(meminfo_kb(meminfo, "SwapFree:"), None);
    }

    #[test]
    fn test_scene_info() {
        let state = test_state();
        let info = scene_info(&state);
        assert_eq!(info.source, "test.tif");
        assert_eq!((info.rows, info.cols), (2, 2));
        assert!(info.memory_bytes >= 16);
    }

    #[tokio::test]
    async fn test_heartbeat_response_structure() {
        let (status, body) = get(test_state(), "/heartbeat").await;
        assert_eq!(status, StatusCode::OK);

        let heartbeat = json(&body);
        assert_eq!(heartbeat["status"], "healthy");
        assert_eq!(heartbeat["server_id"].as_str().unwrap().len(), 36);
        assert_eq!(heartbeat["scene"]["source"], "test.tif");
        assert_eq!(heartbeat["cache"]["capacity"], 4);
    }
}
