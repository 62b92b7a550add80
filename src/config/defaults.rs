//! Default value functions referenced by `#[serde(default = ...)]`.

pub fn default_port() -> u16 {
    3536
}

// --- server ---

pub fn default_max_players() -> usize {
    10
}

pub fn default_sweep_interval() -> u64 {
    1800
}

pub fn default_idle_room_timeout() -> u64 {
    7200
}

// --- websocket ---

pub fn default_max_message_size() -> usize {
    4096
}

pub fn default_pong_wait_secs() -> u64 {
    60
}

pub fn default_ping_period_secs() -> u64 {
    27
}

pub fn default_write_wait_secs() -> u64 {
    10
}

pub fn default_send_queue_capacity() -> usize {
    256
}

// --- security ---

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub fn default_auth_secret() -> String {
    // Development fallback; deployments override via config or env.
    "encore-dev-secret".to_string()
}

// --- logging ---

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_log_rotation() -> String {
    "daily".to_string()
}
