//! Turning a composed HTML document into a PDF file

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RenderError, Result};

/// A4 paper size in inches, portrait
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;

/// Page settings for one rasterization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub landscape: bool,
    pub print_background: bool,
}

impl PageSetup {
    pub fn a4(landscape: bool) -> Self {
        Self {
            landscape,
            print_background: true,
        }
    }
}

/// Produces a file from a composed document
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Write `html` rendered with `setup` to `output`
    async fn rasterize(&self, html: &str, setup: PageSetup, output: &Path) -> Result<()>;
}

/// Headless Chromium rasterizer
///
/// One browser process is shared for the lifetime of the rasterizer; each
/// call opens its own page and closes it afterwards.
pub struct ChromiumRasterizer {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
}

impl ChromiumRasterizer {
    /// Launch a headless browser
    pub async fn launch(executable: Option<PathBuf>) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(RenderError::Rasterize)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Rasterize(format!("failed to launch browser: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        info!("Headless browser launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
        })
    }

    async fn print(
        page: &Page,
        html: &str,
        setup: PageSetup,
        output: &Path,
    ) -> std::result::Result<(), CdpError> {
        page.set_content(html).await?;
        page.save_pdf(Self::pdf_params(setup), output).await?;
        Ok(())
    }

    fn pdf_params(setup: PageSetup) -> PrintToPdfParams {
        PrintToPdfParams {
            landscape: Some(setup.landscape),
            print_background: Some(setup.print_background),
            paper_width: Some(A4_WIDTH_IN),
            paper_height: Some(A4_HEIGHT_IN),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Rasterizer for ChromiumRasterizer {
    async fn rasterize(&self, html: &str, setup: PageSetup, output: &Path) -> Result<()> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Rasterize(format!("failed to open page: {}", e)))?
        };
        let page = PageGuard::new(page);

        let printed = Self::print(page.page(), html, setup, output).await;
        page.close().await;

        printed.map_err(|e| RenderError::Rasterize(e.to_string()))
    }
}

/// Closes its page even when the render future is dropped midway
struct PageGuard {
    page: Page,
    closed: bool,
}

impl PageGuard {
    fn new(page: Page) -> Self {
        Self {
            page,
            closed: false,
        }
    }

    fn page(&self) -> &Page {
        &self.page
    }

    async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.page.clone().close().await {
            warn!("Failed to close render page: {}", e);
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let page = self.page.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Closing abandoned render page");
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        warn!("Failed to close abandoned render page: {}", e);
                    }
                });
            }
            Err(_) => warn!("No runtime to close abandoned render page"),
        }
    }
}

impl Drop for ChromiumRasterizer {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// Writes the composed HTML unchanged
///
/// Used in mock mode and tests, where no browser is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughRasterizer;

#[async_trait]
impl Rasterizer for PassthroughRasterizer {
    async fn rasterize(&self, html: &str, setup: PageSetup, output: &Path) -> Result<()> {
        debug!(
            "Passthrough rasterize to {} (landscape: {})",
            output.display(),
            setup.landscape
        );
        tokio::fs::write(output, html).await?;
        Ok(())
    }
}
