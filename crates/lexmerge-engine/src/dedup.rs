use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

use lexmerge_core::similarity::{distance, max_distance_for};
use lexmerge_core::{DedupConfig, Word, WordId, sorted_ids};

/// Groups frontier words into clusters of likely duplicates.
///
/// Two words are near when the edit distance between their vernaculars,
/// less one if they share an identical gloss, is within the allowance for
/// the shorter vernacular. Clusters are cliques of near words.
#[derive(Debug, Clone)]
pub struct DuplicateFinder {
    max_in_list: usize,
    max_lists: usize,
    max_score: usize,
}

impl Default for DuplicateFinder {
    fn default() -> Self {
        Self::from_config(&DedupConfig::default())
    }
}

impl DuplicateFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self {
            max_in_list: config.max_in_list,
            max_lists: config.max_lists,
            max_score: config.max_score,
        }
    }

    pub fn with_max_in_list(mut self, max_in_list: usize) -> Self {
        self.max_in_list = max_in_list;
        self
    }

    pub fn with_max_lists(mut self, max_lists: usize) -> Self {
        self.max_lists = max_lists;
        self
    }

    pub fn with_max_score(mut self, max_score: usize) -> Self {
        self.max_score = max_score;
        self
    }

    /// Up to `max_lists` disjoint clusters of `2..=max_in_list` words. A
    /// cluster whose exact id set appears in `excluded` is never returned.
    /// A `max_in_list` below 2 admits no cluster at all.
    pub fn find_clusters(&self, words: &[Word], excluded: &[Vec<WordId>]) -> Vec<Vec<Word>> {
        if self.max_lists == 0 || self.max_in_list < 2 || words.len() < 2 {
            return Vec::new();
        }

        let excluded: HashSet<Vec<WordId>> = excluded
            .iter()
            .map(|ids| sorted_ids(ids.iter().cloned()))
            .collect();

        let graph = NearGraph::build(words, self.max_score);

        let mut dsu = DisjointSet::new(words.len());
        for &(i, j) in graph.scores.keys() {
            dsu.union(i, j);
        }

        let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
        for idx in 0..words.len() {
            if !graph.neighbours[idx].is_empty() {
                components.entry(dsu.find(idx)).or_default().push(idx);
            }
        }
        let mut components: Vec<Vec<usize>> = components.into_values().collect();
        components.sort_by_key(|members| members[0]);

        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for members in components {
            self.split_component(&graph, words, members, &excluded, &mut clusters);
        }

        clusters.sort_by_key(|cluster| (!all_same_vernacular(cluster, words), cluster[0]));
        clusters
            .into_iter()
            .take(self.max_lists)
            .map(|cluster| cluster.into_iter().map(|idx| words[idx].clone()).collect())
            .collect()
    }

    fn split_component(
        &self,
        graph: &NearGraph,
        words: &[Word],
        members: Vec<usize>,
        excluded: &HashSet<Vec<WordId>>,
        clusters: &mut Vec<Vec<usize>>,
    ) {
        let mut queue = SeedQueue::new(graph, &members);

        while let Some(seed) = queue.best() {
            let mut candidates: Vec<usize> = graph.neighbours[seed]
                .iter()
                .copied()
                .filter(|&idx| queue.is_available(idx))
                .collect();
            candidates.sort_by_key(|&idx| (graph.score(seed, idx).unwrap_or(usize::MAX), idx));

            let mut cluster = vec![seed];
            for candidate in candidates {
                if cluster.len() >= self.max_in_list {
                    break;
                }
                if cluster.iter().all(|&m| graph.score(m, candidate).is_some()) {
                    cluster.push(candidate);
                }
            }

            let key = sorted_ids(cluster.iter().map(|&idx| words[idx].id.clone()));
            if cluster.len() >= 2 && !excluded.contains(&key) {
                for &idx in &cluster {
                    queue.remove(graph, idx);
                }
                clusters.push(cluster);
            } else {
                queue.remove(graph, seed);
            }
        }
    }
}

/// Sparse adjacency of near word pairs, keyed by index into the input slice.
struct NearGraph {
    neighbours: Vec<Vec<usize>>,
    scores: HashMap<(usize, usize), usize>,
}

impl NearGraph {
    fn build(words: &[Word], max_score: usize) -> Self {
        let lengths: Vec<usize> = words.iter().map(|w| w.vernacular.chars().count()).collect();
        let glosses: Vec<HashSet<(&str, &str)>> = words.iter().map(gloss_set).collect();

        let mut neighbours = vec![Vec::new(); words.len()];
        let mut scores = HashMap::new();

        // Shortest first: the inner scan stops at the first gap no allowance bridges.
        let widest = max_score.max(1) + 1;
        let mut by_length: Vec<usize> = (0..words.len()).filter(|&idx| lengths[idx] > 0).collect();
        by_length.sort_by_key(|&idx| (lengths[idx], idx));

        for (pos, &i) in by_length.iter().enumerate() {
            for &j in &by_length[pos + 1..] {
                let gap = lengths[j] - lengths[i];
                if gap > widest {
                    break;
                }
                let allowed = max_distance_for(lengths[i], max_score);
                let bonus = usize::from(!glosses[i].is_disjoint(&glosses[j]));
                if gap > allowed + bonus {
                    continue;
                }

                let score = distance(&words[i].vernacular, &words[j].vernacular).saturating_sub(bonus);
                if score <= allowed {
                    neighbours[i].push(j);
                    neighbours[j].push(i);
                    scores.insert((i.min(j), i.max(j)), score);
                }
            }
        }

        Self { neighbours, scores }
    }

    fn score(&self, a: usize, b: usize) -> Option<usize> {
        let key = if a < b { (a, b) } else { (b, a) };
        self.scores.get(&key).copied()
    }
}

/// Words of one component still free to join a cluster, ordered as seeds:
/// most available neighbours, then the lowest total score to them, then the
/// earliest position. Removing a word updates only its neighbours.
struct SeedQueue {
    available: HashMap<usize, (usize, usize)>,
    order: BTreeSet<(Reverse<usize>, usize, usize)>,
}

impl SeedQueue {
    fn new(graph: &NearGraph, members: &[usize]) -> Self {
        let mut available = HashMap::with_capacity(members.len());
        let mut order = BTreeSet::new();
        for &idx in members {
            let count = graph.neighbours[idx].len();
            let total: usize = graph.neighbours[idx]
                .iter()
                .filter_map(|&n| graph.score(idx, n))
                .sum();
            available.insert(idx, (count, total));
            if count > 0 {
                order.insert((Reverse(count), total, idx));
            }
        }
        Self { available, order }
    }

    fn best(&self) -> Option<usize> {
        self.order.first().map(|&(_, _, idx)| idx)
    }

    fn is_available(&self, idx: usize) -> bool {
        self.available.contains_key(&idx)
    }

    fn remove(&mut self, graph: &NearGraph, idx: usize) {
        let Some((count, total)) = self.available.remove(&idx) else {
            return;
        };
        self.order.remove(&(Reverse(count), total, idx));

        for &n in &graph.neighbours[idx] {
            let Some(entry) = self.available.get_mut(&n) else {
                continue;
            };
            let (count, total) = *entry;
            self.order.remove(&(Reverse(count), total, n));
            let score = graph.score(idx, n).unwrap_or(0);
            *entry = (count.saturating_sub(1), total.saturating_sub(score));
            if entry.0 > 0 {
                self.order.insert((Reverse(entry.0), entry.1, n));
            }
        }
    }
}

fn gloss_set(word: &Word) -> HashSet<(&str, &str)> {
    word.senses
        .iter()
        .filter(|s| s.is_active())
        .flat_map(|s| s.glosses.iter())
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(lang, text)| (lang.as_str(), text.as_str()))
        .collect()
}

fn all_same_vernacular(cluster: &[usize], words: &[Word]) -> bool {
    let first = &words[cluster[0]].vernacular;
    cluster.iter().all(|&idx| &words[idx].vernacular == first)
}

#[derive(Debug, Clone)]
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, left: usize, right: usize) {
        let left_root = self.find(left);
        let right_root = self.find(right);

        if left_root == right_root {
            return;
        }

        match self.rank[left_root].cmp(&self.rank[right_root]) {
            std::cmp::Ordering::Less => self.parent[left_root] = right_root,
            std::cmp::Ordering::Greater => self.parent[right_root] = left_root,
            std::cmp::Ordering::Equal => {
                self.parent[right_root] = left_root;
                self.rank[left_root] += 1;
            }
        }
    }
}
