//! Desktop actions: opening the authorization page in the browser.

use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};

/// Opens URLs outside the application.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> ClientResult<()>;
}

/// Opens URLs with the desktop's default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> ClientResult<()> {
        debug!(url = %url, "opening URL in default browser");
        open::that(url).map_err(|e| ClientError::Action(format!("failed to open URL: {}", e)))?;
        info!("opened authorization page in browser");
        Ok(())
    }
}
