use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cairn_domain::date_format;
use cairn_service::{
	CairnService, Providers, RenderedContext, RetrieveRequest, RetrieveResponse,
};

#[derive(Debug, Parser)]
#[command(
	version = cairn_cli::VERSION,
	rename_all = "kebab",
	styles = cairn_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Answer a single question and print the selected bundles.
	#[arg(long, short = 'q', value_name = "TEXT", conflicts_with = "dataset")]
	pub query: Option<String>,
	/// Alternate phrasing searched alongside the question; repeatable.
	#[arg(long = "variant", value_name = "TEXT")]
	pub variants: Vec<String>,
	/// Date recency is measured from. Defaults to today (UTC).
	#[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
	pub reference_date: Option<Date>,
	#[arg(long, value_name = "NAME")]
	pub collection: Option<String>,
	/// JSON or JSONL file of queries with expected doc ids.
	#[arg(long, short = 'd', value_name = "FILE", required_unless_present = "query")]
	pub dataset: Option<PathBuf>,
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
	#[arg(long, value_name = "N")]
	pub budget: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	#[serde(default)]
	defaults: EvalDefaults,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct EvalDefaults {
	#[serde(default, with = "date_format::option")]
	reference_date: Option<Date>,
	collection: Option<String>,
	top_k: Option<u32>,
	budget: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	#[serde(alias = "query")]
	question: String,
	#[serde(default)]
	variants: Vec<String>,
	#[serde(default, with = "date_format::option")]
	reference_date: Option<Date>,
	collection: Option<String>,
	top_k: Option<u32>,
	budget: Option<u32>,
	expected_doc_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct QueryOutput {
	response: RetrieveResponse,
	contexts: Vec<CollectionContext>,
}

#[derive(Debug, Serialize)]
struct CollectionContext {
	collection: String,
	context: RenderedContext,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: EvalDatasetInfo,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	query_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	avg_recall_at_k: f64,
	avg_precision_at_k: f64,
	mean_rr: f64,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	question: String,
	request_id: Uuid,
	expected_count: usize,
	retrieved_count: usize,
	relevant_count: usize,
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	latency_ms: f64,
	expected_doc_ids: Vec<String>,
	retrieved_doc_ids: Vec<String>,
}

struct Metrics {
	recall_at_k: f64,
	precision_at_k: f64,
	rr: f64,
	relevant_count: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = cairn_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let service = CairnService::load(config, Providers::default()).await?;
	let json = match &args.query {
		Some(question) => serde_json::to_string_pretty(&answer(&service, question, &args).await?)?,
		None => {
			let dataset_path =
				args.dataset.as_ref().ok_or_else(|| eyre::eyre!("--dataset is required."))?;
			let dataset = load_dataset(dataset_path)?;

			serde_json::to_string_pretty(&eval_dataset(&service, &dataset, &args).await?)?
		},
	};

	println!("{json}");

	Ok(())
}

fn parse_date(raw: &str) -> Result<Date, String> {
	date_format::parse(raw).map_err(|err| format!("Expected YYYY-MM-DD: {err}."))
}

fn today() -> Date {
	OffsetDateTime::now_utc().date()
}

async fn answer(
	service: &CairnService,
	question: &str,
	args: &Args,
) -> color_eyre::Result<QueryOutput> {
	let mut request = RetrieveRequest::new(question, args.reference_date.unwrap_or_else(today));

	request.variants = args.variants.clone();
	request.collection = args.collection.clone();
	request.top_k = args.top_k;
	request.budget = args.budget;

	let response = service.retrieve(request).await?;
	let min_chars = service.cfg.selection.min_bundle_chars as usize;
	let contexts = response
		.collections
		.iter()
		.map(|result| CollectionContext {
			collection: result.collection.clone(),
			context: cairn_service::render_context(&result.bundles, min_chars),
		})
		.collect();

	Ok(QueryOutput { response, contexts })
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let is_jsonl = path.extension().is_some_and(|ext| ext == "jsonl");

	parse_dataset(&raw, is_jsonl)
}

/// Parses either a JSON dataset object or one query object per JSONL line.
fn parse_dataset(raw: &str, is_jsonl: bool) -> color_eyre::Result<EvalDataset> {
	let dataset = if is_jsonl {
		let queries = raw
			.lines()
			.enumerate()
			.filter(|(_, line)| !line.trim().is_empty())
			.map(|(index, line)| {
				serde_json::from_str::<EvalQuery>(line)
					.map_err(|err| eyre::eyre!("Invalid query on line {}: {err}.", index + 1))
			})
			.collect::<color_eyre::Result<Vec<_>>>()?;

		EvalDataset { name: None, defaults: EvalDefaults::default(), queries }
	} else {
		serde_json::from_str(raw)?
	};

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

async fn eval_dataset(
	service: &CairnService,
	dataset: &EvalDataset,
	args: &Args,
) -> color_eyre::Result<EvalOutput> {
	let defaults = &dataset.defaults;
	let fallback_date = args.reference_date.or(defaults.reference_date).unwrap_or_else(today);
	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.iter().enumerate() {
		let mut request =
			RetrieveRequest::new(&query.question, query.reference_date.unwrap_or(fallback_date));

		request.variants = query.variants.clone();
		request.collection = query
			.collection
			.clone()
			.or_else(|| args.collection.clone())
			.or_else(|| defaults.collection.clone());
		request.top_k = query.top_k.or(args.top_k).or(defaults.top_k);
		request.budget = query.budget.or(args.budget).or(defaults.budget);

		let start = Instant::now();
		let response = service.retrieve(request).await?;
		let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;
		let retrieved = ranked_doc_ids(&response);
		let expected: HashSet<&str> = query.expected_doc_ids.iter().map(String::as_str).collect();
		let metrics = compute_metrics(&retrieved, &expected);

		tracing::debug!(
			query = index,
			request_id = %response.request_id,
			recall = metrics.recall_at_k,
			latency_ms,
			"Eval query finished."
		);

		reports.push(QueryReport {
			id: query.id.clone().unwrap_or_else(|| index.to_string()),
			question: query.question.clone(),
			request_id: response.request_id,
			expected_count: expected.len(),
			retrieved_count: retrieved.len(),
			relevant_count: metrics.relevant_count,
			recall_at_k: metrics.recall_at_k,
			precision_at_k: metrics.precision_at_k,
			rr: metrics.rr,
			latency_ms,
			expected_doc_ids: query.expected_doc_ids.clone(),
			retrieved_doc_ids: retrieved,
		});
		latencies_ms.push(latency_ms);
	}

	let summary = summarize(&reports, &latencies_ms);

	Ok(EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "eval".to_string()),
			query_count: reports.len(),
		},
		summary,
		queries: reports,
	})
}

/// Doc ids of every selected bundle, best bundle first, without repeats.
fn ranked_doc_ids(response: &RetrieveResponse) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for result in &response.collections {
		// Bundles come back most relevant last.
		for bundle in result.bundles.iter().rev() {
			for doc_id in &bundle.doc_ids {
				if seen.insert(doc_id.as_str()) {
					out.push(doc_id.clone());
				}
			}
		}
	}

	out
}

fn compute_metrics(retrieved: &[String], expected: &HashSet<&str>) -> Metrics {
	let expected_count = expected.len();
	let mut relevant_count = 0usize;
	let mut first_hit: Option<usize> = None;

	for (idx, doc_id) in retrieved.iter().enumerate() {
		if expected.contains(doc_id.as_str()) {
			relevant_count += 1;

			if first_hit.is_none() {
				first_hit = Some(idx + 1);
			}
		}
	}

	let rr = first_hit.map(|rank| 1.0 / rank as f64).unwrap_or(0.0);
	let precision_at_k =
		if retrieved.is_empty() { 0.0 } else { relevant_count as f64 / retrieved.len() as f64 };
	let recall_at_k =
		if expected_count == 0 { 0.0 } else { relevant_count as f64 / expected_count as f64 };

	Metrics { recall_at_k, precision_at_k, rr, relevant_count }
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let avg_recall_at_k = reports.iter().map(|r| r.recall_at_k).sum::<f64>() / count;
	let avg_precision_at_k = reports.iter().map(|r| r.precision_at_k).sum::<f64>() / count;
	let mean_rr = reports.iter().map(|r| r.rr).sum::<f64>() / count;
	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(f64::total_cmp);

	EvalSummary {
		avg_recall_at_k,
		avg_precision_at_k,
		mean_rr,
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
	}
}

/// Linear interpolation between the closest ranks of an ascending slice.
fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
