//! Retrieval Benchmark: synthetic product catalog
//! Measures Recall@10 and QPS per vector tier, BM25 QPS, and end-to-end pipeline latency
//!
//! Usage: cargo bench --bench retrieval_bench

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shopsearch_core::bm25::LexicalIndex;
use shopsearch_core::embedding::{EmbeddingProvider, HashingEmbedder};
use shopsearch_core::ranking::MlReranker;
use shopsearch_core::search::SemanticSource;
use shopsearch_core::vector::{IndexTier, VectorIndex, VectorIndexOptions};
use shopsearch_core::{Catalog, Pipeline, PipelineConfig, Preset, Product, SearchRequest};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

const NUM_VECTORS: usize = 20_000;
const DIM: usize = 64;
const NUM_QUERIES: usize = 200;
const K: usize = 10;

const CATEGORIES: [&str; 8] = [
    "shoes", "phones", "laptops", "headphones", "watches", "shirts", "jeans", "bags",
];
const BRANDS: [&str; 10] = [
    "Nike", "Samsung", "Dell", "Sony", "Titan", "Puma", "Levis", "Apple", "Boat", "Wildcraft",
];
const ADJECTIVES: [&str; 10] = [
    "wireless", "running", "slim", "gaming", "classic", "waterproof", "cotton", "leather",
    "smart", "budget",
];

fn random_unit_vectors(rng: &mut StdRng, n: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|_| {
            let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-12);
            v.into_iter().map(|x| x / norm).collect()
        })
        .collect()
}

fn recall_at_k(predicted: &[(u32, f32)], truth: &[(u32, f32)], k: usize) -> f64 {
    let truth: HashSet<u32> = truth.iter().take(k).map(|&(id, _)| id).collect();
    if truth.is_empty() {
        return 1.0;
    }
    let hits = predicted.iter().take(k).filter(|(id, _)| truth.contains(id)).count();
    hits as f64 / truth.len() as f64
}

fn synthetic_catalog(rng: &mut StdRng, n: usize) -> Catalog {
    let products = (0..n)
        .map(|i| {
            let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
            let brand = BRANDS[rng.gen_range(0..BRANDS.len())];
            let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
            let mut p = Product::new(format!("p{i}"), format!("{brand} {adjective} {category}"));
            p.brand = brand.to_string();
            p.category = category.to_string();
            p.price = rng.gen_range(199.0..60_000.0);
            p.original_price = p.price;
            p.discount_percentage = rng.gen_range(0.0..60.0);
            p.rating = rng.gen_range(1.0..5.0);
            p.review_count = rng.gen_range(0..5_000);
            p.stock_quantity = rng.gen_range(0..200);
            p.is_in_stock = p.stock_quantity > 0;
            p.seller_rating = rng.gen_range(2.5..5.0);
            p.delivery_days = rng.gen_range(1..10);
            p.ctr = rng.gen_range(0.0..0.1);
            p.conversion_rate = rng.gen_range(0.0..0.08);
            p
        })
        .collect();
    Catalog::new(products).unwrap()
}

fn main() {
    println!("=== Retrieval Benchmark: synthetic catalog ===");
    println!();
    let mut rng = StdRng::seed_from_u64(7);

    // --- Vector tiers ---
    print!("Generating vectors...");
    let vectors = random_unit_vectors(&mut rng, NUM_VECTORS, DIM);
    let queries = random_unit_vectors(&mut rng, NUM_QUERIES, DIM);
    println!(" {NUM_VECTORS} x {DIM}d, {NUM_QUERIES} queries");

    let exact = VectorIndex::build_with(
        &vectors,
        VectorIndexOptions {
            tier: Some(IndexTier::Flat),
            ..Default::default()
        },
    )
    .unwrap();
    let truth: Vec<Vec<(u32, f32)>> = queries.iter().map(|q| exact.search(q, K).unwrap()).collect();

    println!();
    println!("  tier     | nprobe | build (s) | Recall@10 |    QPS");
    println!("  ---------+--------+-----------+-----------+---------");
    for (tier, nprobes) in [
        (IndexTier::Flat, vec![0usize]),
        (IndexTier::IvfFlat, vec![4, 8, 16, 32]),
        (IndexTier::IvfSq8, vec![4, 8, 16, 32]),
    ] {
        for nprobe in nprobes {
            let t0 = Instant::now();
            let index = VectorIndex::build_with(
                &vectors,
                VectorIndexOptions {
                    tier: Some(tier),
                    nprobe: (nprobe > 0).then_some(nprobe),
                    ..Default::default()
                },
            )
            .unwrap();
            let build_s = t0.elapsed().as_secs_f64();

            let t0 = Instant::now();
            let mut recall = 0.0;
            for (q, gt) in queries.iter().zip(&truth) {
                let results = index.search(q, K).unwrap();
                recall += recall_at_k(&results, gt, K);
            }
            let elapsed = t0.elapsed().as_secs_f64();
            println!(
                "  {:<8} | {:>6} | {:>9.2} | {:>9.4} | {:>7.0}",
                format!("{tier:?}"),
                if nprobe == 0 { "-".to_string() } else { nprobe.to_string() },
                build_s,
                recall / NUM_QUERIES as f64,
                NUM_QUERIES as f64 / elapsed
            );
        }
    }

    // --- BM25 ---
    println!();
    println!("--- BM25 ---");
    let catalog = Arc::new(synthetic_catalog(&mut rng, NUM_VECTORS));
    let t0 = Instant::now();
    let lexical = Arc::new(LexicalIndex::from_catalog(&catalog).unwrap());
    println!(
        "  Indexed {} products in {:.2}s ({} terms)",
        catalog.len(),
        t0.elapsed().as_secs_f64(),
        lexical.vocabulary_size()
    );
    let text_queries: Vec<String> = (0..NUM_QUERIES)
        .map(|_| {
            format!(
                "{} {} {}",
                BRANDS[rng.gen_range(0..BRANDS.len())],
                ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())],
                CATEGORIES[rng.gen_range(0..CATEGORIES.len())]
            )
        })
        .collect();
    let t0 = Instant::now();
    let mut returned = 0usize;
    for q in &text_queries {
        returned += lexical.search(q, K).len();
    }
    let elapsed = t0.elapsed().as_secs_f64();
    println!(
        "  {:.0} QPS, {:.3}ms avg, {:.1} results/query",
        NUM_QUERIES as f64 / elapsed,
        elapsed * 1000.0 / NUM_QUERIES as f64,
        returned as f64 / NUM_QUERIES as f64
    );

    // --- End to end ---
    println!();
    println!("--- Pipeline (hashing embedder, untrained reranker) ---");
    let embedder = Arc::new(HashingEmbedder::new(DIM));
    let texts: Vec<String> = catalog.products().iter().map(|p| p.embedding_text()).collect();
    let embeddings = embedder.embed_batch(&texts).unwrap();
    let index = Arc::new(VectorIndex::build(&embeddings, None).unwrap());
    println!("  Vector tier: {:?}", index.tier());

    for preset in [Preset::Lexical, Preset::Relevance, Preset::Business] {
        let pipeline = Pipeline::new(
            PipelineConfig::preset(preset),
            Arc::clone(&catalog),
            Some(Arc::clone(&lexical)),
            Some(SemanticSource {
                index: Arc::clone(&index),
                embedder: embedder.clone(),
            }),
            MlReranker::untrained(),
        )
        .unwrap();

        let mut latencies: Vec<f64> = text_queries
            .iter()
            .map(|q| {
                let t0 = Instant::now();
                let _ = pipeline.search(&SearchRequest::new(q.as_str()).top_k(K));
                t0.elapsed().as_secs_f64() * 1000.0
            })
            .collect();
        latencies.sort_by(|a, b| a.total_cmp(b));
        let p50 = latencies[latencies.len() / 2];
        let p99 = latencies[(latencies.len() * 99 / 100).min(latencies.len() - 1)];
        println!("  {:<10} p50 {:>7.3}ms  p99 {:>7.3}ms", preset.as_str(), p50, p99);
    }
}
