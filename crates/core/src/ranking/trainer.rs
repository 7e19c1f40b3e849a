//! Offline LambdaMART training from logged searches and click-derived labels.
//!
//! Logged results are joined with graded relevance labels keyed by
//! `(query, product_id)`. Rows are grouped by query, split into train and
//! validation sets by query (never by row), standardized with statistics fit on
//! the training rows, and boosted until validation NDCG stops improving.

use crate::config;
use crate::error::{ArtifactError, TrainingError};
use crate::product::Catalog;
use crate::ranking::features::{FeatureRow, ResultSnapshot, StandardScaler};
use crate::ranking::lambdamart::{lambda_gradients, LambdaMart, RegressionTree, TreeParams};
use crate::ranking::metrics::ndcg_for_scores;
use crate::search::types::MatchType;
use crate::storage::artifacts::ArtifactPaths;
use crate::storage::persistence::save_artifact;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::time::Instant;
use tracing::{debug, info};

/// One logged search: the query and the results shown for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchLog {
    pub query: String,
    pub results: Vec<ResultSnapshot>,
}

/// Graded relevance per query and product id, on the 0-4 scale.
pub type RelevanceLabels = HashMap<String, HashMap<String, f32>>;

/// Training input as stored on disk: `{"searches": [...], "labels": {...}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingData {
    pub searches: Vec<SearchLog>,
    pub labels: RelevanceLabels,
}

/// Rows grouped by query. Group `i` covers `rows[groups[i]]`.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    rows: Vec<FeatureRow>,
    labels: Vec<f32>,
    queries: Vec<String>,
    groups: Vec<Range<usize>>,
}

impl TrainingSet {
    /// Joins logged results with labels. Queries without a label entry are skipped;
    /// unlabeled results of a labeled query get relevance 0.
    pub fn from_logs(logs: &[SearchLog], labels: &RelevanceLabels) -> Result<Self, TrainingError> {
        let mut order: Vec<&str> = Vec::new();
        let mut grouped: HashMap<&str, Vec<(FeatureRow, f32)>> = HashMap::new();

        for log in logs {
            let Some(query_labels) = labels.get(&log.query) else {
                continue;
            };
            let entry = grouped.entry(log.query.as_str()).or_insert_with(|| {
                order.push(log.query.as_str());
                Vec::new()
            });
            for result in &log.results {
                let label = query_labels.get(&result.product_id).copied().unwrap_or(0.0);
                let label = if label.is_finite() {
                    label.clamp(0.0, config::MAX_RELEVANCE_LABEL)
                } else {
                    0.0
                };
                entry.push((result.features(), label));
            }
        }

        let mut set = TrainingSet::default();
        for query in order {
            let Some(rows) = grouped.remove(query) else {
                continue;
            };
            if rows.is_empty() {
                continue;
            }
            let start = set.rows.len();
            for (row, label) in rows {
                set.rows.push(row);
                set.labels.push(label);
            }
            set.groups.push(start..set.rows.len());
            set.queries.push(query.to_string());
        }

        if set.rows.is_empty() {
            return Err(TrainingError::EmptyTrainingSet(format!(
                "none of {} logged searches has relevance labels",
                logs.len()
            )));
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_queries(&self) -> usize {
        self.groups.len()
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Splits by query with a seeded shuffle. At least one query is held out
    /// whenever there are two or more queries and `fraction > 0`.
    pub fn split(&self, fraction: f32, seed: u64) -> (TrainingSet, TrainingSet) {
        let n = self.groups.len();
        let mut ids: Vec<usize> = (0..n).collect();
        ids.shuffle(&mut StdRng::seed_from_u64(seed));
        let n_val = if n >= 2 && fraction > 0.0 {
            ((n as f32 * fraction) as usize).max(1)
        } else {
            0
        };
        let validation: BTreeSet<usize> = ids[..n_val.min(n)].iter().copied().collect();

        let mut train = TrainingSet::default();
        let mut val = TrainingSet::default();
        for g in 0..n {
            let target = if validation.contains(&g) { &mut val } else { &mut train };
            target.push_group(self, g);
        }
        (train, val)
    }

    fn push_group(&mut self, from: &TrainingSet, g: usize) {
        let range = from.groups[g].clone();
        let start = self.rows.len();
        self.rows.extend_from_slice(&from.rows[range.clone()]);
        self.labels.extend_from_slice(&from.labels[range]);
        self.groups.push(start..self.rows.len());
        self.queries.push(from.queries[g].clone());
    }

    fn scaled(&self, scaler: &StandardScaler) -> Vec<FeatureRow> {
        self.rows.iter().map(|r| scaler.transform(r)).collect()
    }

    fn mean_ndcg(&self, scores: &[f32], k: usize) -> f64 {
        if self.groups.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .groups
            .iter()
            .map(|g| ndcg_for_scores(&self.labels[g.clone()], &scores[g.clone()], k))
            .sum();
        total / self.groups.len() as f64
    }
}

/// LambdaMART hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub num_rounds: usize,
    pub learning_rate: f32,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub early_stopping_rounds: usize,
    pub ndcg_at: usize,
    pub validation_fraction: f32,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_rounds: config::RANKER_NUM_ROUNDS,
            learning_rate: config::RANKER_LEARNING_RATE,
            max_depth: config::RANKER_MAX_DEPTH,
            min_samples_leaf: config::RANKER_MIN_SAMPLES_LEAF,
            early_stopping_rounds: config::RANKER_EARLY_STOPPING_ROUNDS,
            ndcg_at: config::RANKER_NDCG_AT,
            validation_fraction: config::RANKER_VALIDATION_FRACTION,
            seed: config::RANKER_SPLIT_SEED,
        }
    }
}

impl TrainerConfig {
    fn validate(&self) -> Result<(), TrainingError> {
        if self.num_rounds == 0 {
            return Err(TrainingError::InvalidConfig("num_rounds must be at least 1".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainingError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_depth == 0 || self.ndcg_at == 0 {
            return Err(TrainingError::InvalidConfig(
                "max_depth and ndcg_at must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(TrainingError::InvalidConfig(format!(
                "validation_fraction must be in [0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

/// Summary of a training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub num_samples: usize,
    pub num_queries: usize,
    pub train_queries: usize,
    pub validation_queries: usize,
    /// Number of trees kept.
    pub best_iteration: usize,
    pub train_ndcg: f64,
    pub validation_ndcg: Option<f64>,
    pub feature_importance: Vec<(&'static str, f64)>,
    pub elapsed_ms: f64,
}

/// Model, scaler, and the report of the run that produced them.
#[derive(Debug, Clone)]
pub struct TrainedRanker {
    pub model: LambdaMart,
    pub scaler: StandardScaler,
    pub report: TrainingReport,
}

impl TrainedRanker {
    /// Writes the model and scaler as two independent artifacts.
    pub fn save(&self, paths: &ArtifactPaths) -> Result<(), ArtifactError> {
        save_artifact(&self.model, &paths.ranker_model())?;
        save_artifact(&self.scaler, &paths.feature_scaler())?;
        info!(dir = %paths.dir().display(), trees = self.model.num_trees(), "Saved ranker artifacts");
        Ok(())
    }
}

/// Trains a LambdaMART ranker.
pub fn train_ranker(
    logs: &[SearchLog],
    labels: &RelevanceLabels,
    config: &TrainerConfig,
) -> Result<TrainedRanker, TrainingError> {
    config.validate()?;
    let start = Instant::now();

    let set = TrainingSet::from_logs(logs, labels)?;
    let (train, val) = set.split(config.validation_fraction, config.seed);
    if train.is_empty() {
        return Err(TrainingError::NoTrainingQueries {
            held_out: val.num_queries(),
        });
    }
    info!(
        samples = set.len(),
        queries = set.num_queries(),
        train_queries = train.num_queries(),
        validation_queries = val.num_queries(),
        "Training ranker"
    );

    let scaler = StandardScaler::fit(&train.rows)?;
    let train_x = train.scaled(&scaler);
    let val_x = val.scaled(&scaler);

    let params = TreeParams {
        max_depth: config.max_depth,
        min_samples_leaf: config.min_samples_leaf,
    };
    let mut model = LambdaMart::new(config.learning_rate);
    let mut train_scores = vec![0f32; train.len()];
    let mut val_scores = vec![0f32; val.len()];
    let mut gradients = vec![0f32; train.len()];
    let mut hessians = vec![0f32; train.len()];

    let mut best_ndcg = f64::NEG_INFINITY;
    let mut best_iteration = 0;
    let mut stale = 0;

    for round in 0..config.num_rounds {
        lambda_gradients(
            &train.labels,
            &train_scores,
            &train.groups,
            config.ndcg_at,
            &mut gradients,
            &mut hessians,
        );
        let tree = RegressionTree::fit(&train_x, &gradients, &hessians, params);
        for (s, row) in train_scores.iter_mut().zip(&train_x) {
            *s += config.learning_rate * tree.predict(row);
        }
        for (s, row) in val_scores.iter_mut().zip(&val_x) {
            *s += config.learning_rate * tree.predict(row);
        }
        model.push_tree(tree);

        if val.is_empty() {
            best_iteration = round + 1;
            continue;
        }
        let ndcg = val.mean_ndcg(&val_scores, config.ndcg_at);
        if round % 10 == 0 {
            debug!(round, validation_ndcg = ndcg, "Boosting round");
        }
        if ndcg > best_ndcg + 1e-9 {
            best_ndcg = ndcg;
            best_iteration = round + 1;
            stale = 0;
        } else {
            stale += 1;
            if stale >= config.early_stopping_rounds {
                debug!(round, best_iteration, "Early stopping");
                break;
            }
        }
    }
    model.truncate(best_iteration);

    let final_train: Vec<f32> = train_x.iter().map(|r| model.predict(r)).collect();
    let report = TrainingReport {
        num_samples: set.len(),
        num_queries: set.num_queries(),
        train_queries: train.num_queries(),
        validation_queries: val.num_queries(),
        best_iteration,
        train_ndcg: train.mean_ndcg(&final_train, config.ndcg_at),
        validation_ndcg: (!val.is_empty()).then_some(best_ndcg),
        feature_importance: model.feature_importance(),
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    info!(
        best_iteration = report.best_iteration,
        train_ndcg = report.train_ndcg,
        validation_ndcg = ?report.validation_ndcg,
        elapsed_ms = report.elapsed_ms,
        "Ranker trained"
    );

    Ok(TrainedRanker {
        model,
        scaler,
        report,
    })
}

const PRICE_POINTS: [&str; 5] = ["500", "1000", "2000", "5000", "10000"];

/// Builds deterministic synthetic search logs and click labels from a catalog.
///
/// Queries follow common e-commerce templates ("best {category}", "{brand}
/// {category}", "{category} under {price}", ...). Scores favour title overlap,
/// brand matches, rating for "best" queries, and low price for budget queries.
/// Clicks follow a position-biased probability scaled by relevance and quality.
pub fn synthesize_training_data(catalog: &Catalog, num_queries: usize, seed: u64) -> TrainingData {
    let mut rng = StdRng::seed_from_u64(seed);
    let products = catalog.products();
    if products.is_empty() {
        return TrainingData::default();
    }

    let categories: Vec<&str> = distinct(products.iter().map(|p| p.category.as_str()));
    let brands: Vec<&str> = distinct(products.iter().map(|p| p.brand.as_str()))
        .into_iter()
        .take(20)
        .collect();

    let mut data = TrainingData::default();
    for _ in 0..num_queries {
        let query = synth_query(&mut rng, catalog, &categories, &brands);
        let query_lc = query.to_lowercase();
        let query_tokens: BTreeSet<&str> = query_lc.split_whitespace().collect();

        let count = rng.gen_range(5..=20).min(products.len());
        let picked: Vec<_> = products.choose_multiple(&mut rng, count).collect();
        let mut results: Vec<(ResultSnapshot, f32)> = picked
            .into_iter()
            .map(|p| {
                let title_lc = p.title.to_lowercase();
                let overlap = title_lc
                    .split_whitespace()
                    .collect::<BTreeSet<_>>()
                    .intersection(&query_tokens)
                    .count() as f32;
                let mut semantic = 0.3 + 0.7 * rng.gen::<f32>();
                let mut lexical = (0.2 + 0.3 * overlap + 0.3 * rng.gen::<f32>()).min(1.0);
                if query_lc.starts_with("best") {
                    semantic *= p.rating as f32 / 5.0;
                }
                if query_lc.contains("cheap") || query_lc.contains("under") {
                    let price_factor = (1.0 - p.price as f32 / 10_000.0).max(0.1);
                    semantic *= 0.3 + 0.7 * price_factor;
                }
                if !p.brand.is_empty() && query_lc.contains(&p.brand.to_lowercase()) {
                    semantic = (semantic * 1.5).min(1.0);
                    lexical = (lexical * 1.5).min(1.0);
                }
                let match_type = if semantic > 0.7 && lexical > 0.7 {
                    MatchType::Hybrid
                } else if semantic > lexical {
                    MatchType::Semantic
                } else {
                    MatchType::Lexical
                };
                let combined = 0.6 * semantic + 0.4 * lexical;
                let snapshot = ResultSnapshot {
                    product_id: p.product_id.clone(),
                    semantic_score: semantic,
                    lexical_score: lexical,
                    price: p.price as f32,
                    rating: p.rating as f32,
                    position: 0,
                    match_type,
                };
                (snapshot, combined)
            })
            .collect();
        results.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut clicks = HashMap::new();
        for (i, (snapshot, combined)) in results.iter_mut().enumerate() {
            snapshot.position = i + 1;
            let base = (1.0 - 0.1 * snapshot.position as f32).max(0.05);
            let relevance = 0.5 + 0.5 * *combined;
            let quality = 0.5 + 0.5 * snapshot.rating / 5.0;
            if rng.gen::<f32>() < base * relevance * quality {
                let noise = rng.gen_range(-0.5f32..0.5);
                let label = (relevance * quality * config::MAX_RELEVANCE_LABEL + noise)
                    .clamp(1.0, config::MAX_RELEVANCE_LABEL);
                clicks.insert(snapshot.product_id.clone(), label);
            }
        }

        data.labels.insert(query.clone(), clicks);
        data.searches.push(SearchLog {
            query,
            results: results.into_iter().map(|(s, _)| s).collect(),
        });
    }
    info!(queries = data.searches.len(), "Synthesized training data");
    data
}

fn synth_query(rng: &mut StdRng, catalog: &Catalog, categories: &[&str], brands: &[&str]) -> String {
    let category = categories.choose(rng).copied().unwrap_or("products");
    let brand = brands.choose(rng).copied().unwrap_or("generic");
    match rng.gen_range(0..7) {
        0 => format!("best {category}"),
        1 => format!("{brand} {category}"),
        2 => format!("cheap {category}"),
        3 => format!("high quality {category}"),
        4 => {
            let price = PRICE_POINTS.choose(rng).copied().unwrap_or("1000");
            format!("{category} under {price}")
        }
        5 => format!("{brand} products"),
        _ => {
            let idx = rng.gen_range(0..catalog.len());
            catalog
                .products()
                .get(idx)
                .map(|p| p.title.split_whitespace().take(3).collect::<Vec<_>>().join(" "))
                .unwrap_or_else(|| category.to_string())
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    values.filter(|v| !v.is_empty() && seen.insert(*v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Product;

    fn snap(id: &str, semantic: f32, position: usize) -> ResultSnapshot {
        ResultSnapshot {
            product_id: id.to_string(),
            semantic_score: semantic,
            lexical_score: 0.5,
            price: 100.0,
            rating: 4.0,
            position,
            match_type: MatchType::Hybrid,
        }
    }

    fn catalog(n: usize) -> Catalog {
        let categories = ["shoes", "phones", "laptops"];
        let brands = ["Nike", "Samsung", "Dell", "Puma"];
        Catalog::new(
            (0..n)
                .map(|i| {
                    let mut p = Product::new(format!("p{i}"), format!("item {i} {}", categories[i % 3]));
                    p.category = categories[i % 3].to_string();
                    p.brand = brands[i % 4].to_string();
                    p.price = 200.0 + (i * 137 % 9000) as f64;
                    p.rating = 1.0 + (i % 5) as f64 * 0.9;
                    p.stock_quantity = 10;
                    p
                })
                .collect(),
        )
        .unwrap()
    }

    /// Logs where the label is a monotone function of the semantic score.
    fn learnable(num_queries: usize) -> TrainingData {
        let mut data = TrainingData::default();
        for q in 0..num_queries {
            let query = format!("query {q}");
            let results: Vec<ResultSnapshot> = (0..8)
                .map(|i| snap(&format!("q{q}d{i}"), ((i * 3 + q) % 8) as f32 / 8.0, i + 1))
                .collect();
            let labels = results
                .iter()
                .map(|r| (r.product_id.clone(), (r.semantic_score * 5.0).floor().min(4.0)))
                .collect();
            data.labels.insert(query.clone(), labels);
            data.searches.push(SearchLog { query, results });
        }
        data
    }

    #[test]
    fn test_join_skips_unlabeled_queries() {
        let logs = vec![
            SearchLog {
                query: "a".into(),
                results: vec![snap("x", 0.9, 1), snap("y", 0.1, 2)],
            },
            SearchLog {
                query: "b".into(),
                results: vec![snap("z", 0.5, 1)],
            },
        ];
        let mut labels = RelevanceLabels::new();
        labels.insert("a".into(), HashMap::from([("x".to_string(), 9.0)]));
        let set = TrainingSet::from_logs(&logs, &labels).unwrap();
        assert_eq!(set.num_queries(), 1);
        assert_eq!(set.labels, vec![config::MAX_RELEVANCE_LABEL, 0.0]);
    }

    #[test]
    fn test_empty_join_is_an_error() {
        let logs = vec![SearchLog {
            query: "a".into(),
            results: vec![snap("x", 0.9, 1)],
        }];
        let err = TrainingSet::from_logs(&logs, &RelevanceLabels::new()).unwrap_err();
        assert!(matches!(err, TrainingError::EmptyTrainingSet(_)));
        assert!(matches!(
            train_ranker(&logs, &RelevanceLabels::new(), &TrainerConfig::default()),
            Err(TrainingError::EmptyTrainingSet(_))
        ));
    }

    #[test]
    fn test_split_is_by_query() {
        let data = learnable(10);
        let set = TrainingSet::from_logs(&data.searches, &data.labels).unwrap();
        let (train, val) = set.split(0.2, 42);
        assert_eq!(val.num_queries(), 2);
        assert_eq!(train.num_queries(), 8);
        assert!(train.queries().iter().all(|q| !val.queries().contains(q)));
        assert_eq!(train.len() + val.len(), set.len());

        let (again, _) = set.split(0.2, 42);
        assert_eq!(again.queries(), train.queries());
    }

    #[test]
    fn test_single_query_not_held_out() {
        let data = learnable(1);
        let set = TrainingSet::from_logs(&data.searches, &data.labels).unwrap();
        let (train, val) = set.split(0.2, 42);
        assert_eq!(train.num_queries(), 1);
        assert!(val.is_empty());
    }

    #[test]
    fn test_training_learns_signal() {
        let data = learnable(30);
        let trained = train_ranker(&data.searches, &data.labels, &TrainerConfig::default()).unwrap();
        assert!(trained.model.num_trees() >= 1);
        assert!(trained.report.train_ndcg > 0.85, "train ndcg {}", trained.report.train_ndcg);
        assert!(trained.report.validation_ndcg.is_some());
        assert!(trained
            .report
            .feature_importance
            .iter()
            .any(|(name, _)| *name == "semantic_score"));

        let high = trained.scaler.transform(&snap("h", 0.95, 5).features());
        let low = trained.scaler.transform(&snap("l", 0.05, 5).features());
        assert!(trained.model.predict(&high) > trained.model.predict(&low));
    }

    #[test]
    fn test_invalid_config() {
        let data = learnable(3);
        let config = TrainerConfig {
            num_rounds: 0,
            ..Default::default()
        };
        assert!(matches!(
            train_ranker(&data.searches, &data.labels, &config),
            Err(TrainingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_synthetic_data_deterministic() {
        let c = catalog(40);
        let a = synthesize_training_data(&c, 25, 7);
        let b = synthesize_training_data(&c, 25, 7);
        assert_eq!(a.searches, b.searches);
        assert_eq!(a.searches.len(), 25);
        for log in &a.searches {
            assert!((5..=20).contains(&log.results.len()));
            let positions: Vec<usize> = log.results.iter().map(|r| r.position).collect();
            assert_eq!(positions, (1..=log.results.len()).collect::<Vec<_>>());
        }
        assert!(a
            .labels
            .values()
            .flat_map(|m| m.values())
            .all(|l| (1.0..=4.0).contains(l)));
    }

    #[test]
    fn test_synthetic_data_trains() {
        let c = catalog(60);
        let data = synthesize_training_data(&c, 40, 3);
        let trained = train_ranker(&data.searches, &data.labels, &TrainerConfig::default()).unwrap();
        assert!(trained.model.num_trees() >= 1);
    }
}
