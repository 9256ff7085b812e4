//! `SystemParams` — the subset of `setsystemparams`/`currentsystemparams`
//! state this core tracks (§5 "System parameters").
//!
//! Serializable with `serde` so a host embedding this core can snapshot or
//! seed parameters from a config file the same way it would any other
//! configuration, matching how the rest of this pack's services externalize
//! settings rather than hardcoding them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemParams {
    pub job_timeout: f64,
    pub wait_timeout: f64,
    pub max_font_cache: usize,
    pub max_path_cache: usize,
    pub byte_order: ByteOrder,
    pub build_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    LowFirst,
    HighFirst,
}

impl Default for SystemParams {
    fn default() -> Self {
        SystemParams {
            job_timeout: 0.0,
            wait_timeout: 0.0,
            max_font_cache: 512,
            max_path_cache: 512,
            byte_order: ByteOrder::HighFirst,
            build_time: 0,
        }
    }
}
