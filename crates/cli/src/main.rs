use clap::{Args as ClapArgs, Parser, Subcommand};
use shopsearch_core::config;
use shopsearch_core::embedding::{EmbeddingProvider, HashingEmbedder};
use shopsearch_core::pipeline::{build_artifacts, load_pipeline, SortOrder};
use shopsearch_core::ranking::{synthesize_training_data, train_ranker, TrainerConfig, TrainingData};
use shopsearch_core::search::{SearchFilters, SearchMode};
use shopsearch_core::storage::ArtifactPaths;
use shopsearch_core::vector::{IndexTier, VectorIndexOptions};
use shopsearch_core::{Catalog, PipelineConfig, Preset, SearchRequest, SearchResponse};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shopsearch", about = "Hybrid product search with business scoring and a learned reranker")]
struct Args {
    /// Directory holding the catalog snapshot, indices, and ranker artifacts
    #[arg(short, long, global = true, default_value = config::DEFAULT_ARTIFACT_DIR)]
    artifacts: PathBuf,

    /// Stage preset: full, business, relevance, lexical, or semantic
    #[arg(long, global = true, default_value_t = Preset::Full)]
    preset: Preset,

    /// JSON pipeline config file. Overrides --preset; missing fields take full-preset values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dimension of the built-in hashing embedder
    #[arg(long, global = true, default_value_t = config::HASHING_EMBEDDER_DIM)]
    dim: usize,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a product file and build the BM25 and vector indices
    BuildIndex(BuildArgs),
    /// Train the LambdaMART reranker from search logs and relevance labels
    Train(TrainArgs),
    /// Run one query against the loaded artifacts
    Search(SearchArgs),
}

#[derive(ClapArgs)]
struct BuildArgs {
    /// Products as a JSON array or JSON lines
    catalog: PathBuf,

    /// Force a vector index tier (flat, ivf-flat, ivf-sq8) instead of the size-based default
    #[arg(long, value_parser = parse_tier)]
    tier: Option<IndexTier>,

    /// Number of IVF partitions
    #[arg(long)]
    n_lists: Option<usize>,

    /// IVF partitions probed per query
    #[arg(long)]
    nprobe: Option<usize>,
}

#[derive(ClapArgs)]
struct TrainArgs {
    /// JSON file with `searches` and `labels`
    #[arg(long, conflicts_with = "synthetic", required_unless_present = "synthetic")]
    data: Option<PathBuf>,

    /// Synthesize this many queries from the artifact catalog instead of reading --data
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for synthesis and the train/validation split
    #[arg(long, default_value_t = config::RANKER_SPLIT_SEED)]
    seed: u64,

    /// Boosting rounds
    #[arg(long, default_value_t = config::RANKER_NUM_ROUNDS)]
    rounds: usize,

    /// Write the synthesized data to this file
    #[arg(long, requires = "synthetic")]
    dump_data: Option<PathBuf>,
}

#[derive(ClapArgs)]
struct SearchArgs {
    query: String,

    #[arg(short = 'k', long, default_value_t = config::DEFAULT_TOP_K)]
    top_k: usize,

    #[arg(long, default_value_t = 1)]
    page: usize,

    /// lexical, semantic, hybrid, or auto. Defaults to the pipeline's mode.
    #[arg(long)]
    mode: Option<SearchMode>,

    /// relevance, price_low, price_high, rating, or popularity
    #[arg(long, default_value = "relevance")]
    sort: SortOrder,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    brand: Option<String>,

    #[arg(long)]
    min_price: Option<f64>,

    #[arg(long)]
    max_price: Option<f64>,

    #[arg(long)]
    min_rating: Option<f64>,

    #[arg(long, default_value_t = false)]
    in_stock_only: bool,

    /// Print the full response as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Print the top business factors and active boosts of each hit
    #[arg(long, default_value_t = false)]
    explain: bool,
}

fn parse_tier(s: &str) -> Result<IndexTier, String> {
    match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
        "flat" => Ok(IndexTier::Flat),
        "ivf-flat" | "ivf" => Ok(IndexTier::IvfFlat),
        "ivf-sq8" | "sq8" => Ok(IndexTier::IvfSq8),
        other => Err(format!("unknown tier '{other}' (expected flat, ivf-flat, or ivf-sq8)")),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("shopsearch=info,shopsearch_core=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn pipeline_config(args: &Args) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let config = match args.config {
        Some(ref path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::preset(args.preset),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.log_json);

    if args.dim == 0 || args.dim > config::MAX_DIMENSION {
        eprintln!(
            "Error: --dim must be between 1 and {}, got {}",
            config::MAX_DIMENSION,
            args.dim
        );
        std::process::exit(1);
    }
    let paths = ArtifactPaths::new(args.artifacts.clone());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(args.dim));

    match args.command {
        Command::BuildIndex(ref build) => run_build(build, &paths, embedder.as_ref()),
        Command::Train(ref train) => run_train(train, &paths),
        Command::Search(ref search) => run_search(search, &args, &paths, embedder),
    }
}

fn run_build(
    build: &BuildArgs,
    paths: &ArtifactPaths,
    embedder: &dyn EmbeddingProvider,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Catalog::load(&build.catalog)?;
    tracing::info!("Loaded {} products from {}", catalog.len(), build.catalog.display());
    let options = VectorIndexOptions {
        size_hint: None,
        tier: build.tier,
        n_lists: build.n_lists,
        nprobe: build.nprobe,
    };
    let summary = build_artifacts(&catalog, embedder, paths, options)?;
    println!(
        "Built artifacts in {}: {} products, {} terms, {:?} vector index ({}d), {:.1}ms",
        paths.dir().display(),
        summary.products,
        summary.vocabulary,
        summary.vector_tier,
        summary.dimensions,
        summary.elapsed_ms
    );
    Ok(())
}

fn run_train(train: &TrainArgs, paths: &ArtifactPaths) -> Result<(), Box<dyn std::error::Error>> {
    let data = match train.data.as_deref() {
        Some(path) => read_training_data(path)?,
        None => {
            let Some(n) = train.synthetic else {
                return Err("either --data or --synthetic is required".into());
            };
            let catalog = Catalog::load(&paths.catalog())?;
            let data = synthesize_training_data(&catalog, n, train.seed);
            if let Some(ref out) = train.dump_data {
                std::fs::write(out, serde_json::to_vec_pretty(&data)?)?;
                tracing::info!("Wrote synthesized training data to {}", out.display());
            }
            data
        }
    };

    let trainer = TrainerConfig {
        num_rounds: train.rounds,
        seed: train.seed,
        ..TrainerConfig::default()
    };
    let trained = train_ranker(&data.searches, &data.labels, &trainer)?;
    trained.save(paths)?;
    println!("{}", serde_json::to_string_pretty(&trained.report)?);
    Ok(())
}

fn read_training_data(path: &Path) -> Result<TrainingData, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let data: TrainingData = serde_json::from_str(&text)?;
    tracing::info!(
        searches = data.searches.len(),
        labelled_queries = data.labels.len(),
        "Read training data from {}",
        path.display()
    );
    Ok(data)
}

fn run_search(
    search: &SearchArgs,
    args: &Args,
    paths: &ArtifactPaths,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline_config(args)?;
    let pipeline = load_pipeline(paths, config, embedder)?;

    let filters = SearchFilters {
        category: search.category.clone(),
        brand: search.brand.clone(),
        min_price: search.min_price,
        max_price: search.max_price,
        min_rating: search.min_rating,
        in_stock_only: search.in_stock_only,
    };
    let mut request = SearchRequest::new(search.query.as_str())
        .top_k(search.top_k)
        .page(search.page)
        .filters(filters)
        .sort(search.sort);
    if let Some(mode) = search.mode {
        request = request.mode(mode);
    }

    let response = pipeline.search(&request)?;
    if search.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    print_response(&response);

    if search.explain {
        println!();
        for hit in &response.hits {
            let Some(product) = pipeline.catalog().get(hit.candidate.doc_id) else {
                continue;
            };
            let score = pipeline.scorer().score_product(product, hit.candidate.combined_score);
            let explanation = pipeline.scorer().explain(&score);
            println!("{}", serde_json::to_string(&explanation)?);
        }
    }
    Ok(())
}

fn print_response(response: &SearchResponse) {
    println!(
        "{} results for '{}' (mode {}, page {}, {:.2}ms)",
        response.total, response.query, response.mode, response.page, response.elapsed_ms
    );
    for event in &response.degradations {
        println!("  degraded: {} ({}), used {}", event.stage, event.reason, event.fallback);
    }
    println!();
    println!("  pos | score | match    |     price | rating | title");
    println!("  ----+-------+----------+-----------+--------+------");
    for hit in &response.hits {
        let c = &hit.candidate;
        println!(
            "  {:>3} | {:.3} | {:<8} | {:>9.2} | {:>6.1} | {}",
            c.position,
            c.final_score,
            format!("{:?}", c.match_type).to_lowercase(),
            hit.price,
            hit.rating,
            hit.title
        );
    }
}
