//! User agent parsing.
//!
//! Uses woothee, which classifies agents into the categories
//! pc, smartphone, mobilephone, crawler, appliance and misc.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use woothee::parser::Parser;

static PARSER: LazyLock<Parser> = LazyLock::new(Parser::new);

/// Client software derived from a user agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub browser_family: String,
    pub operating_system: String,
    pub device: String,
    pub is_bot: bool,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            browser_family: "unknown".to_string(),
            operating_system: "unknown".to_string(),
            device: "unknown".to_string(),
            is_bot: false,
        }
    }
}

impl Client {
    pub fn parse(user_agent: &str) -> Self {
        let mut client = Self::default();
        if user_agent.trim().is_empty() {
            return client;
        }

        let Some(result) = PARSER.parse(user_agent) else {
            return client;
        };

        if known(result.name) {
            client.browser_family = result.name.to_string();
        }
        if known(result.os) {
            client.operating_system = result.os.to_string();
        }

        client.device = match result.category {
            "pc" => "desktop",
            "smartphone" | "mobilephone" => "mobile",
            "crawler" => "bot",
            "appliance" => "other",
            _ => "unknown",
        }
        .to_string();
        client.is_bot = result.category == "crawler";

        client
    }
}

fn known(value: &str) -> bool {
    !value.is_empty() && value != "UNKNOWN"
}
