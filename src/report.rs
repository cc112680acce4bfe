//! Run summaries handed to the reporting side.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::crawl::CrawlOutcome;
use crate::models::AdDetail;

/// One line of the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdSummary {
    pub link: String,
    pub title: Option<String>,
    pub price: Option<u64>,
    pub currency: Option<String>,
    pub area: Option<f64>,
    pub price_per_area: Option<u64>,
    pub location: Option<String>,
    pub district: Option<String>,
    pub author: Option<String>,
    pub preview: Option<String>,
    /// Detail-page attributes such as floor or heating.
    pub parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

impl From<&AdDetail> for AdSummary {
    fn from(ad: &AdDetail) -> Self {
        Self {
            link: ad.link().to_string(),
            title: ad.candidate.title.clone(),
            price: ad.candidate.price,
            currency: ad.currency.clone(),
            area: ad.candidate.area,
            price_per_area: ad.candidate.price_per_area,
            location: ad.candidate.location.clone(),
            district: ad.district.clone(),
            author: ad.author.clone(),
            preview: ad.description_preview(),
            parameters: ad.parameters.clone(),
            duplicate_of: ad.duplicate_of.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_date: NaiveDate,
    pub target_day: NaiveDate,
    pub pages_visited: u32,
    pub stop_reason: String,
    /// Mean price per square metre over ads that have one; 0 when none do.
    pub average_price_per_area: u64,
    pub probable_duplicates: usize,
    pub ads: Vec<AdSummary>,
}

impl RunSummary {
    pub fn from_outcome(outcome: &CrawlOutcome) -> Self {
        let per_area: Vec<u64> = outcome
            .ads
            .values()
            .filter_map(|ad| ad.candidate.price_per_area)
            .collect();
        let average_price_per_area = if per_area.is_empty() {
            0
        } else {
            (per_area.iter().sum::<u64>() as f64 / per_area.len() as f64).round() as u64
        };

        Self {
            run_date: outcome.context.run_date,
            target_day: outcome.context.target_day,
            pages_visited: outcome.pages_visited,
            stop_reason: outcome.stop_reason.to_string(),
            average_price_per_area,
            probable_duplicates: outcome
                .ads
                .values()
                .filter(|ad| ad.is_probable_duplicate())
                .count(),
            ads: outcome.ads.values().map(AdSummary::from).collect(),
        }
    }
}

/// Consumes the final result of a clean run.
pub trait Reporter {
    fn report(&mut self, summary: &RunSummary) -> std::io::Result<()>;
}

/// Plain-text summary on any writer.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, summary: &RunSummary) -> std::io::Result<()> {
        writeln!(
            self.out,
            "Ads for {}: {} (pages: {}, stopped: {})",
            summary.target_day,
            summary.ads.len(),
            summary.pages_visited,
            summary.stop_reason
        )?;
        writeln!(
            self.out,
            "Average price per m²: {}",
            summary.average_price_per_area
        )?;
        writeln!(
            self.out,
            "Probable duplicates: {}",
            summary.probable_duplicates
        )?;

        for ad in &summary.ads {
            writeln!(self.out)?;
            writeln!(self.out, "{}", ad.title.as_deref().unwrap_or("(untitled)"))?;
            let price = match (ad.price, ad.currency.as_deref()) {
                (Some(price), Some(currency)) => format!("{} {}", price, currency),
                (price, _) => or_dash(price),
            };
            writeln!(
                self.out,
                "  price: {}  area: {}  per m²: {}",
                price,
                or_dash(ad.area),
                or_dash(ad.price_per_area)
            )?;
            if let Some(ref district) = ad.district {
                writeln!(self.out, "  district: {}", district)?;
            }
            if let Some(ref author) = ad.author {
                writeln!(self.out, "  author: {}", author)?;
            }
            for (name, value) in &ad.parameters {
                writeln!(self.out, "  {}: {}", name, value)?;
            }
            if let Some(ref preview) = ad.preview {
                writeln!(self.out, "  {}", preview)?;
            }
            if let Some(ref original) = ad.duplicate_of {
                writeln!(self.out, "  probable duplicate of {}", original)?;
            }
            writeln!(self.out, "  {}", ad.link)?;
        }
        self.out.flush()
    }
}

/// Writes the summary as pretty JSON to a file.
pub struct JsonReporter {
    path: PathBuf,
}

impl JsonReporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Reporter for JsonReporter {
    fn report(&mut self, summary: &RunSummary) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(&self.path, json)
    }
}
