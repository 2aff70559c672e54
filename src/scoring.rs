// src/scoring.rs
//! Keyword relevance scoring: context bonus, per-category keyword hits with a
//! cap, optional developer-context penalty. Pure and deterministic.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::ingest::types::Post;

/// Tables shipped with the binary; used when no config file is present.
pub const EMBEDDED_SCORING_TOML: &str = include_str!("../config/scoring.toml");
pub const DEFAULT_SCORING_CONFIG_PATH: &str = "config/scoring.toml";

/// Pain-point categories. Declared in ascending key order so the derived
/// `Ord` sorts the same way the keys do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PainPoint {
    DirectorNetwork,
    IxbrlParsing,
    RateLimit,
}

impl PainPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            PainPoint::DirectorNetwork => "director_network",
            PainPoint::IxbrlParsing => "ixbrl_parsing",
            PainPoint::RateLimit => "rate_limit",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "director_network" => Some(PainPoint::DirectorNetwork),
            "ixbrl_parsing" => Some(PainPoint::IxbrlParsing),
            "rate_limit" => Some(PainPoint::RateLimit),
            _ => None,
        }
    }
}

impl fmt::Display for PainPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post plus its relevance. Built once by [`ScoringEngine::score`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPost {
    pub post: Post,
    pub score: f64,
    pub matched_pain_points: BTreeSet<PainPoint>,
}

impl ScoredPost {
    /// Comma list for messages; "general" when nothing matched.
    pub fn pain_points_label(&self) -> String {
        if self.matched_pain_points.is_empty() {
            return "general".to_string();
        }
        self.matched_pain_points
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub weights: WeightsCfg,
    pub context: KeywordsCfg,
    pub dev_context: DevContextCfg,
    pub categories: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WeightsCfg {
    pub keyword: f64,
    pub category_cap: f64,
    pub context_bonus: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordsCfg {
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevContextCfg {
    #[serde(default = "default_apply_penalty")]
    pub apply_penalty: bool,
    #[serde(default = "default_penalty_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_apply_penalty() -> bool {
    true
}
fn default_penalty_multiplier() -> f64 {
    0.5
}

/* ----------------------------
Compiled engine
---------------------------- */

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: WeightsCfg,
    context: Vec<String>,
    dev_context: Vec<String>,
    penalty_multiplier: f64,
    apply_penalty: bool,
    categories: Vec<(PainPoint, Vec<String>)>,
    dev_log: bool,
}

impl ScoringEngine {
    pub fn new(cfg: ScoringConfig) -> Result<Self> {
        let w = cfg.weights;
        for (name, v) in [
            ("keyword", w.keyword),
            ("category_cap", w.category_cap),
            ("context_bonus", w.context_bonus),
        ] {
            if !v.is_finite() || v < 0.0 {
                bail!("scoring weight `{name}` must be a non-negative number, got {v}");
            }
        }
        let m = cfg.dev_context.multiplier;
        if !(0.0..=1.0).contains(&m) {
            bail!("dev_context.multiplier must be within 0..=1, got {m}");
        }

        let mut categories = cfg
            .categories
            .into_iter()
            .map(|(key, kws)| {
                let pp = PainPoint::from_key(&key)
                    .ok_or_else(|| anyhow!("unknown pain point category `{key}`"))?;
                Ok((pp, clean_keywords(kws)))
            })
            .collect::<Result<Vec<_>>>()?;
        categories.sort_by_key(|(pp, _)| *pp);

        Ok(Self {
            weights: w,
            context: clean_keywords(cfg.context.keywords),
            dev_context: clean_keywords(cfg.dev_context.keywords),
            penalty_multiplier: m,
            apply_penalty: cfg.dev_context.apply_penalty,
            categories,
            dev_log: false,
        })
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let cfg: ScoringConfig = toml::from_str(toml_str).context("parsing scoring toml")?;
        Self::new(cfg)
    }

    /// Engine built from the tables compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_SCORING_TOML)
    }

    /// Load from `path` when it exists, otherwise fall back to the embedded tables.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(target: "scoring", path = %path.display(), "scoring config not found, using embedded tables");
            return Self::embedded();
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading scoring config at {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn with_dev_context_penalty(mut self, on: bool) -> Self {
        self.apply_penalty = on;
        self
    }

    pub fn with_dev_log(mut self, on: bool) -> Self {
        self.dev_log = on;
        self
    }

    pub fn dev_context_penalty_enabled(&self) -> bool {
        self.apply_penalty
    }

    /// Score one post. Never fails; the result depends only on title, body and tags.
    pub fn score(&self, post: &Post) -> ScoredPost {
        let corpus = searchable_text(post);

        let context = if contains_any(&corpus, &self.context) {
            self.weights.context_bonus
        } else {
            0.0
        };

        let mut matched = BTreeSet::new();
        let mut categories_total = 0.0;
        for (pp, kws) in &self.categories {
            let hits = kws.iter().filter(|kw| corpus.contains(kw.as_str())).count();
            if hits == 0 {
                continue;
            }
            let contribution = (hits as f64 * self.weights.keyword).min(self.weights.category_cap);
            if contribution > 0.0 {
                matched.insert(*pp);
                categories_total += contribution;
            }
        }

        let mut total = (context + categories_total).min(1.0);
        if self.apply_penalty && !contains_any(&corpus, &self.dev_context) {
            total *= self.penalty_multiplier;
        }
        let score = round4(total);

        if self.dev_log {
            dev_log_score(&corpus, score, &matched);
        }

        ScoredPost {
            post: post.clone(),
            score,
            matched_pain_points: matched,
        }
    }
}

/// Title, body and tags joined by spaces, lower-cased.
fn searchable_text(post: &Post) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(post.tags.len() + 2);
    parts.push(&post.title);
    parts.push(&post.body);
    parts.extend(post.tags.iter().map(String::as_str));
    parts.join(" ").to_lowercase()
}

fn contains_any(corpus: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|kw| corpus.contains(kw.as_str()))
}

/// Lower-case, drop blanks (an empty needle would match everything) and duplicates.
fn clean_keywords(items: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let kw = it.to_lowercase();
        if kw.trim().is_empty() {
            continue;
        }
        if seen.insert(kw.clone()) {
            out.push(kw);
        }
    }
    out
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Never logs raw text, only a hashed id.
fn dev_log_score(corpus: &str, score: f64, matched: &BTreeSet<PainPoint>) {
    let id = anon_hash(corpus);
    let matched: Vec<&str> = matched.iter().map(|p| p.as_str()).collect();
    info!(target: "scoring", %id, score, matched = ?matched, "scored");
}
