//! Default values used by the Config struct.

pub(crate) fn default_ssh_binary() -> String {
    "ssh".to_string()
}
pub(crate) fn default_scp_binary() -> String {
    "scp".to_string()
}
pub(crate) fn default_tmux_binary() -> String {
    "tmux".to_string()
}
pub(crate) fn default_log_filter() -> String {
    "warn".to_string()
}
