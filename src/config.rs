//! Decoder configuration
use serde::{Deserialize, Serialize};

/// Options shared by the vendor decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DecoderConfig {
    /// Yield reassembled pings whose beam count is short of the declared total
    ///
    /// When false such pings are dropped with a warning.
    pub allow_incomplete_pings: bool,
}

impl DecoderConfig {
    /// Set the incomplete ping policy
    pub fn allow_incomplete_pings(mut self, allow: bool) -> Self {
        self.allow_incomplete_pings = allow;
        self
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            allow_incomplete_pings: true,
        }
    }
}
