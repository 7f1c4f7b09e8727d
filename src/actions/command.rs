//! The action catalog.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

/// Every action the policy may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionName {
    Click,
    Type,
    Scroll,
    OpenApp,
    PressKey,
    Wait,
    Finish,
}

impl ActionName {
    pub const ALL: [ActionName; 7] = [
        ActionName::Click,
        ActionName::Type,
        ActionName::Scroll,
        ActionName::OpenApp,
        ActionName::PressKey,
        ActionName::Wait,
        ActionName::Finish,
    ];

    /// Wire name used in policy replies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Click => "click",
            ActionName::Type => "type",
            ActionName::Scroll => "scroll",
            ActionName::OpenApp => "open_app",
            ActionName::PressKey => "press_key",
            ActionName::Wait => "wait",
            ActionName::Finish => "finish",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`ActionName::from_str`] for names outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownActionName(pub String);

impl FromStr for ActionName {
    type Err = UnknownActionName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownActionName(s.to_string()))
    }
}

/// A named action with its raw parameters.
///
/// Parameters are validated by the dispatcher, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCommand {
    pub name: ActionName,
    pub params: Map<String, Value>,
}

impl ActionCommand {
    /// Pair an action name with its raw parameters.
    pub fn new(name: ActionName, params: Map<String, Value>) -> Self {
        Self { name, params }
    }
}

impl fmt::Display for ActionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.params.is_empty() {
            write!(f, " {}", Value::Object(self.params.clone()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_round_trip() {
        for name in ActionName::ALL {
            assert_eq!(name.as_str().parse::<ActionName>().unwrap(), name);
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            "swipe_left".parse::<ActionName>(),
            Err(UnknownActionName("swipe_left".to_string()))
        );
        // names are case sensitive
        assert!("Click".parse::<ActionName>().is_err());
    }

    #[test]
    fn test_display() {
        let mut params = Map::new();
        params.insert("package_name".into(), json!("com.android.settings"));
        let cmd = ActionCommand::new(ActionName::OpenApp, params);
        assert_eq!(
            cmd.to_string(),
            r#"open_app {"package_name":"com.android.settings"}"#
        );
        assert_eq!(
            ActionCommand::new(ActionName::Finish, Map::new()).to_string(),
            "finish"
        );
    }
}
