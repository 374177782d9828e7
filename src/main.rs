// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Parser;
use garmentrs::application::use_cases::scrape_use_case::ImageScraper;
use garmentrs::config::settings::Settings;
use garmentrs::domain::models::item::{ItemDescriptor, ScrapeRequest};
use garmentrs::infrastructure::observability::metrics::describe_metrics;
use garmentrs::utils::telemetry;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "garmentrs")]
#[command(about = "Find, verify and download product images for a clothing or footwear item")]
#[command(version)]
struct Args {
    #[arg(long)]
    brand: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    style: Option<String>,

    #[arg(long)]
    color: Option<String>,

    #[arg(long)]
    barcode: Option<String>,

    /// Scrape this product page instead of searching
    #[arg(long)]
    url: Option<String>,

    /// Download directory (overrides configuration)
    #[arg(long)]
    output: Option<String>,

    /// Maximum number of images to keep
    #[arg(long, default_value = "5")]
    max_images: usize,

    /// Disable the headless browser fallback
    #[arg(long)]
    no_browser: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn descriptor(&self) -> ItemDescriptor {
        ItemDescriptor {
            brand: self.brand.clone(),
            model: self.model.clone(),
            style: self.style.clone(),
            color: self.color.clone(),
            barcode: self.barcode.clone(),
        }
    }
}

/// 主函数
///
/// 加载配置、运行一次抓取，并把保存的文件与 JSON 运行摘要打印到标准输出
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init_telemetry(args.json_logs);
    describe_metrics();

    let mut settings = Settings::new()?;
    if let Some(output) = &args.output {
        settings.storage.download_path = output.clone();
    }
    if args.no_browser {
        settings.browser.enabled = false;
    }
    info!("Configuration loaded, saving to {}", settings.storage.download_path);

    let item = args.descriptor();
    let request = match &args.url {
        Some(url) => ScrapeRequest::for_url(url.clone(), item, args.max_images),
        None => ScrapeRequest::new(item, args.max_images),
    };
    if !request.is_actionable() {
        anyhow::bail!("provide at least one of --brand, --model, --style, --color, --barcode or --url");
    }

    let mut scraper = ImageScraper::new(settings)?;
    let outcome = scraper.scrape_and_download(&request).await?;

    for file in &outcome.files {
        println!("{}", file.display());
    }
    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);

    info!("Saved {} image(s)", outcome.files.len());
    Ok(())
}
