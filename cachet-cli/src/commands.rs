use std::path::Path;

use cachet_engine::{DownloadCoordinator, PreloadScheduler, cacheable_url, key_for};
use tracing::{error, info};

use crate::error::AppError;
use crate::utils::format_bytes;

pub struct CommandExecutor {
    coordinator: DownloadCoordinator,
}

impl CommandExecutor {
    pub fn new(coordinator: DownloadCoordinator) -> Self {
        Self { coordinator }
    }

    /// Resolve every URL, printing one line per result
    pub async fn resolve(&self, urls: &[String]) -> Result<(), AppError> {
        let mut failed = 0;
        for url in urls {
            match self.coordinator.resolve(url).await {
                Ok(path) => println!("{}", path.display()),
                Err(e) => {
                    failed += 1;
                    error!(url = %url, error = %e, "Failed to resolve");
                    eprintln!("{url}: {e}");
                }
            }
        }

        if failed > 0 {
            return Err(AppError::Unresolved {
                failed,
                total: urls.len(),
            });
        }
        Ok(())
    }

    pub async fn preload(
        &self,
        mut urls: Vec<String>,
        file: Option<&Path>,
        concurrency: isize,
    ) -> Result<(), AppError> {
        if let Some(file) = file {
            urls.extend(read_url_list(file).await?);
        }
        if urls.is_empty() {
            return Err(AppError::InvalidInput(
                "no URLs given, pass them as arguments or with --file".to_string(),
            ));
        }

        let summary = PreloadScheduler::new(self.coordinator.clone())
            .with_concurrency(concurrency)
            .run(urls)
            .await;

        println!(
            "requested: {}, cached: {}, failed: {}",
            summary.requested, summary.cached, summary.failed
        );
        Ok(())
    }

    pub fn key(&self, url: &str) -> Result<(), AppError> {
        let policy = &self.coordinator.default_options().query_policy;
        let key = key_for(url, policy)?;

        println!("key:      {key}");
        println!("path:     {}", self.coordinator.store().path_for(&key).display());
        println!("url:      {}", cacheable_url(url, policy)?);
        Ok(())
    }

    pub async fn seed(&self, url: &str, file: &Path) -> Result<(), AppError> {
        let path = self.coordinator.seed(url, file).await?;
        info!(url = %url, source = %file.display(), "Seeded cache entry");
        println!("{}", path.display());
        Ok(())
    }

    pub async fn delete(&self, url: &str) -> Result<(), AppError> {
        self.coordinator.delete(url).await?;
        info!(url = %url, "Deleted cache entry");
        Ok(())
    }

    pub async fn info(&self) -> Result<(), AppError> {
        let info = self.coordinator.info().await?;
        println!("location: {}", self.coordinator.store().root().display());
        println!("files:    {}", info.files);
        println!("size:     {}", format_bytes(info.size));
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        self.coordinator.clear().await?;
        info!(
            location = %self.coordinator.store().root().display(),
            "Cache cleared"
        );
        Ok(())
    }

    /// Only safe while no other process is downloading into the same cache
    pub async fn sweep(&self) -> Result<(), AppError> {
        let swept = self.coordinator.store().sweep_temp_files().await?;
        println!("removed {swept} temp files");
        Ok(())
    }
}

/// One URL per line; blank lines and `#` comments are skipped
async fn read_url_list(path: &Path) -> Result<Vec<String>, AppError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_url_list(&content))
}

fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
