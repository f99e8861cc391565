//! Indicator policy.
//!
//! Decides what each front-panel light should show from the app state.
//! Blink timing and the LED drivers themselves are outside the core; they
//! just render the [`Indicator`] they are handed.
//!
//! | Light   | On                                  | Flash                         | Off              |
//! |---------|-------------------------------------|-------------------------------|------------------|
//! | clock   | wall clock valid                    | clock not yet valid           | never            |
//! | logging | logging, clock valid, no error      | logging but clock/error issue | logging disabled |
//! | fault   | never                               | error flag raised             | no error         |

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Indicator {
    On,
    Off,
    Flash,
}

/// Inputs to the indicator policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusInputs {
    pub time_valid: bool,
    pub logging_enabled: bool,
    pub error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusIndicators {
    pub clock: Indicator,
    pub logging: Indicator,
    pub fault: Indicator,
}

impl StatusIndicators {
    pub fn evaluate(inputs: StatusInputs) -> Self {
        let clock = if inputs.time_valid {
            Indicator::On
        } else {
            Indicator::Flash
        };

        let logging = match (inputs.logging_enabled, inputs.time_valid && !inputs.error) {
            (false, _) => Indicator::Off,
            (true, true) => Indicator::On,
            (true, false) => Indicator::Flash,
        };

        let fault = if inputs.error {
            Indicator::Flash
        } else {
            Indicator::Off
        };

        Self {
            clock,
            logging,
            fault,
        }
    }
}
