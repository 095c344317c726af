use enigo::{Enigo, Mouse, Settings};
use std::sync::Mutex;

use super::Failsafe;

/// Trips when the pointer is pushed into the top-left screen corner.
pub struct CornerFailsafe {
    enigo: Mutex<Enigo>,
    margin: i32,
}

impl CornerFailsafe {
    pub const DEFAULT_MARGIN: i32 = 2;

    pub fn new() -> anyhow::Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("Failed to create pointer probe: {:?}", e))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
            margin: Self::DEFAULT_MARGIN,
        })
    }

    pub fn with_margin(mut self, margin: i32) -> Self {
        self.margin = margin;
        self
    }
}

impl Failsafe for CornerFailsafe {
    fn tripped(&self) -> bool {
        let Ok(enigo) = self.enigo.lock() else {
            return false;
        };
        match enigo.location() {
            Ok((x, y)) => x <= self.margin && y <= self.margin,
            Err(e) => {
                tracing::debug!("Pointer location unavailable: {:?}", e);
                false
            }
        }
    }
}
