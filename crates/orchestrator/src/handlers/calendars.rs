//! list_calendars.

use async_trait::async_trait;
use tracing::info;

use super::{ActionContext, ActionHandler, Resolution};
use crate::extractor::{Action, ExtractedParams};

const LIST_FAILED: &str = "Sorry, I couldn't list your calendars at this time.";

pub struct ListCalendarsHandler;

#[async_trait]
impl ActionHandler for ListCalendarsHandler {
    fn action(&self) -> Action {
        Action::ListCalendars
    }

    async fn resolve(&self, ctx: &ActionContext<'_>, _params: &ExtractedParams) -> Resolution {
        let mut calendars = match ctx.provider.list_calendars().await {
            Ok(calendars) => calendars,
            Err(e) => return Resolution::from_provider_error(&e, LIST_FAILED),
        };
        info!(count = calendars.len(), "CALENDARS_LISTED");
        if calendars.is_empty() {
            return Resolution::Reply("I couldn't find any calendars on your account.".to_string());
        }

        calendars.sort_by_key(|c| !c.primary);
        let lines: Vec<String> = calendars
            .iter()
            .map(|c| {
                let name = if c.summary.trim().is_empty() { c.id.as_str() } else { c.summary.as_str() };
                if c.primary {
                    format!("• {} (primary)", name)
                } else {
                    format!("• {}", name)
                }
            })
            .collect();
        Resolution::Reply(format!("Here are your calendars:\n{}", lines.join("\n")))
    }
}
