//! Taxonomy oracles for negative (non-hyponymy) sampling.
//!
//! A taxonomy is derived once from the *direct* hyponymy edges of a knowledge
//! base and is read-only afterwards, so a built oracle can be shared across
//! data-loading threads.
//!
//! # Distances
//!
//! Every sampled pair carries a signed tree distance:
//!
//! ```text
//!            animal
//!           /      \
//!       mammal     bird
//!       /    \
//!     dog    cat
//!
//! d(animal, dog) = +2      animal is an ancestor of dog
//! d(dog, cat)    = -1      up one step to the LCA (mammal)
//! d(dog, bird)   = -2      up two steps to the LCA (animal)
//! d(dog, mammal) = -1      reverse hyponymy: mammal is the LCA
//! ```
//!
//! Pairs without a common ancestor get `-(depth(x) + 1)`, as if a virtual
//! root sat above every top-level node.
//!
//! # Variants
//!
//! | Variant | Built from | Negative sampling |
//! |---------|-----------|-------------------|
//! | [`BasicTaxonomy`] | any direct-edge set | yes |
//! | [`WordNetTaxonomy`] | WordNet synset edges | [`Error::NotSupported`] |

use crate::error::{Error, Result};
use crate::record::HyponymyRecord;
use crate::relation::{RelationSource, TaxonomyKind};
use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Reversed;
use petgraph::Direction;
use rand::prelude::*;
use rand::RngCore;
use std::collections::{HashMap, HashSet};

/// Rejection draws allowed per requested entity before falling back to a scan.
const REJECTION_BUDGET: usize = 4;

/// Capability to draw entities that are *not* in a hyponymy relation with a query.
pub trait NegativeSampler {
    /// Up to `size` records `(entity -> y)` where `y` is not a hyponym of `entity`.
    ///
    /// With `exclude_ancestors`, hypernyms of `entity` are excluded as well.
    /// A short or empty result is not an error.
    ///
    /// # Arguments
    ///
    /// * `entity` - Query entity, the hypernym of every returned record
    /// * `candidates` - Pool to draw from; `None` draws from the whole taxonomy
    /// * `size` - Maximum number of records
    /// * `exclude_ancestors` - Also reject entities above `entity`
    /// * `rng` - Random source for the draw
    ///
    /// # Complexity
    ///
    /// O(|candidates|) with a pool. Without one, O(size) expected draws for a
    /// typical entity, degrading to O(|V|) for entities related to most of
    /// the taxonomy.
    fn sample_non_hyponyms(
        &self,
        entity: &str,
        candidates: Option<&[String]>,
        size: usize,
        exclude_ancestors: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<HyponymyRecord>>;

    /// Up to `size` records `(x -> entity)` where `x` is not a hypernym of `entity`.
    ///
    /// With `exclude_ancestors`, hyponyms of `entity` are excluded as well.
    /// Arguments and cost mirror [`NegativeSampler::sample_non_hyponyms`], with
    /// `entity` as the hyponym of every returned record.
    fn sample_non_hypernyms(
        &self,
        entity: &str,
        candidates: Option<&[String]>,
        size: usize,
        exclude_ancestors: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<HyponymyRecord>>;
}

/// DAG taxonomy over direct hypernym -> hyponym edges.
///
/// The upward closure (every ancestor with its shortest path length) is
/// computed for every node at construction.
#[derive(Debug, Clone)]
pub struct BasicTaxonomy {
    graph: DiGraph<String, ()>,
    node_index: HashMap<String, NodeIndex>,
    /// ancestors[n] = {ancestor -> shortest upward distance}, including n itself at 0.
    ancestors: Vec<HashMap<NodeIndex, usize>>,
    /// Shortest distance to a root.
    depth: Vec<usize>,
}

impl BasicTaxonomy {
    /// Build from `(hypernym, hyponym)` edges.
    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut node_index: HashMap<String, NodeIndex> = HashMap::new();

        let mut node = |graph: &mut DiGraph<String, ()>, name: &str| -> NodeIndex {
            if let Some(&idx) = node_index.get(name) {
                return idx;
            }
            let idx = graph.add_node(name.to_string());
            node_index.insert(name.to_string(), idx);
            idx
        };

        for (hyper, hypo) in edges {
            let (hyper, hypo) = (hyper.as_ref(), hypo.as_ref());
            if hyper == hypo {
                continue;
            }
            let a = node(&mut graph, hyper);
            let b = node(&mut graph, hypo);
            graph.update_edge(a, b, ());
        }

        let ancestors: Vec<HashMap<NodeIndex, usize>> = graph
            .node_indices()
            .map(|n| dijkstra(Reversed(&graph), n, None, |_| 1usize))
            .collect();

        let depth = graph
            .node_indices()
            .map(|n| {
                ancestors[n.index()]
                    .iter()
                    .filter(|(a, _)| {
                        graph
                            .neighbors_directed(**a, Direction::Incoming)
                            .next()
                            .is_none()
                    })
                    .map(|(_, &d)| d)
                    .min()
                    .unwrap_or(0)
            })
            .collect();

        Self {
            graph,
            node_index,
            ancestors,
            depth,
        }
    }

    /// Build from the direct (`distance == 1`) records of a relation source.
    pub fn from_source<S: RelationSource + ?Sized>(source: &S) -> Self {
        let records = source.slice(0, source.total_size());
        Self::from_edges(
            records
                .iter()
                .filter(|r| r.is_direct())
                .map(|r| (r.hypernym.as_str(), r.hyponym.as_str())),
        )
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of direct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn contains(&self, entity: &str) -> bool {
        self.node_index.contains_key(entity)
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Shortest distance from `entity` to a root.
    pub fn depth(&self, entity: &str) -> Option<usize> {
        self.node_index.get(entity).map(|n| self.depth[n.index()])
    }

    /// Direct hypernyms of `entity`.
    pub fn parents(&self, entity: &str) -> Vec<&str> {
        self.neighbors(entity, Direction::Incoming)
    }

    /// Direct hyponyms of `entity`.
    pub fn children(&self, entity: &str) -> Vec<&str> {
        self.neighbors(entity, Direction::Outgoing)
    }

    fn neighbors(&self, entity: &str, dir: Direction) -> Vec<&str> {
        let Some(&idx) = self.node_index.get(entity) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out
    }

    /// Whether `ancestor` is a strict ancestor of `entity`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: &str, entity: &str) -> bool {
        match (self.node_index.get(ancestor), self.node_index.get(entity)) {
            (Some(&a), Some(&e)) => a != e && self.ancestors[e.index()].contains_key(&a),
            _ => false,
        }
    }

    /// All strict ancestors of `entity`.
    pub fn ancestors(&self, entity: &str) -> HashSet<&str> {
        let Some(&idx) = self.node_index.get(entity) else {
            return HashSet::new();
        };
        self.ancestors[idx.index()]
            .keys()
            .filter(|&&a| a != idx)
            .map(|&a| self.graph[a].as_str())
            .collect()
    }

    fn lca_index(&self, x: NodeIndex, y: NodeIndex) -> Option<(NodeIndex, usize)> {
        let anc_x = &self.ancestors[x.index()];
        let anc_y = &self.ancestors[y.index()];
        anc_x
            .iter()
            .filter_map(|(a, &dx)| anc_y.get(a).map(|&dy| (*a, dx, dy)))
            .min_by_key(|&(a, dx, dy)| (dx, dy, a.index()))
            .map(|(a, dx, _)| (a, dx))
    }

    /// Deepest shared ancestor (nearest to `x`), including `x` or `y` themselves.
    #[must_use]
    pub fn lowest_common_ancestor(&self, x: &str, y: &str) -> Option<&str> {
        let (&xi, &yi) = (self.node_index.get(x)?, self.node_index.get(y)?);
        self.lca_index(xi, yi).map(|(a, _)| self.graph[a].as_str())
    }

    /// Signed tree distance from `hypernym` to `hyponym`; see the module docs.
    ///
    /// `None` when either entity is unknown.
    #[must_use]
    pub fn hyponymy_distance(&self, hypernym: &str, hyponym: &str) -> Option<f32> {
        let (&x, &y) = (
            self.node_index.get(hypernym)?,
            self.node_index.get(hyponym)?,
        );
        if x == y {
            return Some(0.0);
        }
        if let Some(&down) = self.ancestors[y.index()].get(&x) {
            return Some(down as f32);
        }
        let distance = match self.lca_index(x, y) {
            Some((_, up)) => -(up as f32),
            None => -(self.depth[x.index()] as f32 + 1.0),
        };
        Some(distance)
    }

    /// Distinct known candidates passing `keep`, in pool order.
    fn eligible<'a>(
        &'a self,
        candidates: Option<&'a [String]>,
        keep: impl Fn(&str) -> bool,
    ) -> Vec<&'a str> {
        let pool: Box<dyn Iterator<Item = &'a str> + 'a> = match candidates {
            Some(list) => Box::new(list.iter().map(String::as_str)),
            None => Box::new(self.entities()),
        };
        let mut seen = HashSet::new();
        pool.filter(|c| self.contains(c) && seen.insert(*c) && keep(c))
            .collect()
    }

    /// Up to `size` distinct entities passing `keep`, drawn uniformly.
    ///
    /// Without a candidate pool, node indices are rejection-sampled first so
    /// a large taxonomy is not scanned per query. Once `size * REJECTION_BUDGET`
    /// draws have been spent, the remainder comes from a full scan.
    ///
    /// # Complexity
    ///
    /// O(size) expected when most entities pass `keep`; O(|V|) otherwise.
    fn draw<'a>(
        &'a self,
        candidates: Option<&'a [String]>,
        size: usize,
        keep: impl Fn(&str) -> bool,
        rng: &mut dyn RngCore,
    ) -> Vec<&'a str> {
        if candidates.is_some() {
            let eligible = self.eligible(candidates, keep);
            return eligible.choose_multiple(rng, size).copied().collect();
        }

        let n = self.graph.node_count();
        let mut picked: Vec<&'a str> = Vec::with_capacity(size);
        let mut tried: HashSet<usize> = HashSet::new();
        let mut attempts = 0;
        while picked.len() < size && tried.len() < n && attempts < size * REJECTION_BUDGET {
            attempts += 1;
            let idx = rng.random_range(0..n);
            if !tried.insert(idx) {
                continue;
            }
            let name = self.graph[NodeIndex::new(idx)].as_str();
            if keep(name) {
                picked.push(name);
            }
        }

        if picked.len() < size && tried.len() < n {
            let chosen: HashSet<&str> = picked.iter().copied().collect();
            let rest = self.eligible(None, |c| !chosen.contains(c) && keep(c));
            picked.extend(rest.choose_multiple(rng, size - picked.len()).copied());
        }
        picked
    }
}

impl NegativeSampler for BasicTaxonomy {
    fn sample_non_hyponyms(
        &self,
        entity: &str,
        candidates: Option<&[String]>,
        size: usize,
        exclude_ancestors: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<HyponymyRecord>> {
        if size == 0 || !self.contains(entity) {
            return Ok(Vec::new());
        }
        let keep = |c: &str| {
            c != entity
                && !self.is_ancestor(entity, c)
                && !(exclude_ancestors && self.is_ancestor(c, entity))
        };

        let sampled: Vec<HyponymyRecord> = self
            .draw(candidates, size, keep, rng)
            .into_iter()
            .filter_map(|hypo| {
                self.hyponymy_distance(entity, hypo)
                    .map(|d| HyponymyRecord::new(hypo, entity, d))
            })
            .collect();

        if sampled.len() < size {
            tracing::debug!(entity, requested = size, sampled = sampled.len(), "short non-hyponym sample");
        }
        Ok(sampled)
    }

    fn sample_non_hypernyms(
        &self,
        entity: &str,
        candidates: Option<&[String]>,
        size: usize,
        exclude_ancestors: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<HyponymyRecord>> {
        if size == 0 || !self.contains(entity) {
            return Ok(Vec::new());
        }
        let keep = |c: &str| {
            c != entity
                && !self.is_ancestor(c, entity)
                && !(exclude_ancestors && self.is_ancestor(entity, c))
        };

        let sampled: Vec<HyponymyRecord> = self
            .draw(candidates, size, keep, rng)
            .into_iter()
            .filter_map(|hyper| {
                self.hyponymy_distance(hyper, entity)
                    .map(|d| HyponymyRecord::new(entity, hyper, d))
            })
            .collect();

        if sampled.len() < size {
            tracing::debug!(entity, requested = size, sampled = sampled.len(), "short non-hypernym sample");
        }
        Ok(sampled)
    }
}

/// WordNet synset taxonomy.
///
/// Answers the same hierarchy queries as [`BasicTaxonomy`], but negative
/// sampling over synsets (lemma sharing, multiple senses) has no
/// implementation and is reported as [`Error::NotSupported`].
#[derive(Debug, Clone)]
pub struct WordNetTaxonomy {
    inner: BasicTaxonomy,
}

impl WordNetTaxonomy {
    pub fn from_source<S: RelationSource + ?Sized>(source: &S) -> Self {
        Self {
            inner: BasicTaxonomy::from_source(source),
        }
    }

    /// Lemma part of a synset name: `dog.n.01` -> `dog`.
    pub fn lemma(synset: &str) -> &str {
        let mut parts = synset.rsplitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(sense), Some(pos), Some(lemma))
                if sense.chars().all(|c| c.is_ascii_digit()) && pos.len() == 1 =>
            {
                lemma
            }
            _ => synset,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, synset: &str) -> bool {
        self.inner.contains(synset)
    }

    pub fn depth(&self, synset: &str) -> Option<usize> {
        self.inner.depth(synset)
    }

    pub fn is_ancestor(&self, ancestor: &str, synset: &str) -> bool {
        self.inner.is_ancestor(ancestor, synset)
    }

    pub fn lowest_common_ancestor(&self, x: &str, y: &str) -> Option<&str> {
        self.inner.lowest_common_ancestor(x, y)
    }

    pub fn hyponymy_distance(&self, hypernym: &str, hyponym: &str) -> Option<f32> {
        self.inner.hyponymy_distance(hypernym, hyponym)
    }
}

impl NegativeSampler for WordNetTaxonomy {
    fn sample_non_hyponyms(
        &self,
        _entity: &str,
        _candidates: Option<&[String]>,
        _size: usize,
        _exclude_ancestors: bool,
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<HyponymyRecord>> {
        Err(Error::NotSupported(
            "non-hyponym sampling over a WordNet taxonomy".into(),
        ))
    }

    fn sample_non_hypernyms(
        &self,
        _entity: &str,
        _candidates: Option<&[String]>,
        _size: usize,
        _exclude_ancestors: bool,
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<HyponymyRecord>> {
        Err(Error::NotSupported(
            "non-hypernym sampling over a WordNet taxonomy".into(),
        ))
    }
}

/// Taxonomy chosen by the relation source's [`TaxonomyKind`].
#[derive(Debug, Clone)]
pub enum Taxonomy {
    Basic(BasicTaxonomy),
    WordNet(WordNetTaxonomy),
}

impl Taxonomy {
    /// Build the oracle matching `source.taxonomy_kind()`.
    pub fn build<S: RelationSource + ?Sized>(source: &S) -> Self {
        match source.taxonomy_kind() {
            TaxonomyKind::Basic => Self::Basic(BasicTaxonomy::from_source(source)),
            TaxonomyKind::WordNet => Self::WordNet(WordNetTaxonomy::from_source(source)),
        }
    }

    pub fn kind(&self) -> TaxonomyKind {
        match self {
            Self::Basic(_) => TaxonomyKind::Basic,
            Self::WordNet(_) => TaxonomyKind::WordNet,
        }
    }

    pub fn hyponymy_distance(&self, hypernym: &str, hyponym: &str) -> Option<f32> {
        match self {
            Self::Basic(t) => t.hyponymy_distance(hypernym, hyponym),
            Self::WordNet(t) => t.hyponymy_distance(hypernym, hyponym),
        }
    }
}

impl NegativeSampler for Taxonomy {
    fn sample_non_hyponyms(
        &self,
        entity: &str,
        candidates: Option<&[String]>,
        size: usize,
        exclude_ancestors: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<HyponymyRecord>> {
        match self {
            Self::Basic(t) => t.sample_non_hyponyms(entity, candidates, size, exclude_ancestors, rng),
            Self::WordNet(t) => t.sample_non_hyponyms(entity, candidates, size, exclude_ancestors, rng),
        }
    }

    fn sample_non_hypernyms(
        &self,
        entity: &str,
        candidates: Option<&[String]>,
        size: usize,
        exclude_ancestors: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<HyponymyRecord>> {
        match self {
            Self::Basic(t) => t.sample_non_hypernyms(entity, candidates, size, exclude_ancestors, rng),
            Self::WordNet(t) => t.sample_non_hypernyms(entity, candidates, size, exclude_ancestors, rng),
        }
    }
}
