//! Browser actions a caller can request
//!
//! | Action         | Needs permission |
//! | navigate       | yes              |
//! | click          | yes              |
//! | type           | yes              |
//! | createTab      | yes              |
//! | pressKey       | yes              |
//! | selectOption   | yes              |
//! | scroll         | no               |
//! | snapshot       | no               |
//! | screenshot     | no               |
//! | readText       | no               |
//! | listTabs       | no               |

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Navigate,
    Click,
    Type,
    CreateTab,
    PressKey,
    SelectOption,
    Scroll,
    Snapshot,
    Screenshot,
    ReadText,
    ListTabs,
}

impl Action {
    /// Actions that change page or browser state go through negotiation
    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            Action::Navigate
                | Action::Click
                | Action::Type
                | Action::CreateTab
                | Action::PressKey
                | Action::SelectOption
        )
    }

    /// Whether the action runs against an existing tab
    pub fn is_tab_scoped(&self) -> bool {
        !matches!(self, Action::CreateTab | Action::ListTabs)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Navigate => "navigate",
            Action::Click => "click",
            Action::Type => "type",
            Action::CreateTab => "createTab",
            Action::PressKey => "pressKey",
            Action::SelectOption => "selectOption",
            Action::Scroll => "scroll",
            Action::Snapshot => "snapshot",
            Action::Screenshot => "screenshot",
            Action::ReadText => "readText",
            Action::ListTabs => "listTabs",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigate" => Ok(Action::Navigate),
            "click" => Ok(Action::Click),
            "type" => Ok(Action::Type),
            "createTab" => Ok(Action::CreateTab),
            "pressKey" => Ok(Action::PressKey),
            "selectOption" => Ok(Action::SelectOption),
            "scroll" => Ok(Action::Scroll),
            "snapshot" => Ok(Action::Snapshot),
            "screenshot" => Ok(Action::Screenshot),
            "readText" => Ok(Action::ReadText),
            "listTabs" => Ok(Action::ListTabs),
            _ => Err(format!("Unknown action: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_set() {
        for action in [
            Action::Navigate,
            Action::Click,
            Action::Type,
            Action::CreateTab,
            Action::PressKey,
            Action::SelectOption,
        ] {
            assert!(action.is_sensitive(), "{action} should be sensitive");
        }

        for action in [
            Action::Scroll,
            Action::Snapshot,
            Action::Screenshot,
            Action::ReadText,
            Action::ListTabs,
        ] {
            assert!(!action.is_sensitive(), "{action} should not be sensitive");
        }
    }

    #[test]
    fn test_names_match_serde() {
        for action in [Action::CreateTab, Action::PressKey, Action::ReadText] {
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json, action.as_str());
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert!("rm -rf".parse::<Action>().is_err());
    }
}
