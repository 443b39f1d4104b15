use serde::{Deserialize, Serialize};

/// Outcome of a single health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
  Pass,
  Warn,
  Fail,
  Skip,
}

impl CheckStatus {
  pub fn indicator(self) -> &'static str {
    match self {
      CheckStatus::Pass => "[OK]",
      CheckStatus::Warn => "[WARN]",
      CheckStatus::Fail => "[FAIL]",
      CheckStatus::Skip => "[SKIP]",
    }
  }

  pub fn is_warning(self) -> bool {
    matches!(self, CheckStatus::Warn | CheckStatus::Fail)
  }
}
