//! Seeded random edge lists.
//!
//! Edges are drawn uniformly over `0..node_count` from a [`SmallRng`] so
//! every benchmark run sees the same graph.

use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Errors that may occur during edge generation.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyntheticError {
    /// The requested node count was zero.
    #[error("node count must be greater than zero")]
    ZeroNodes,
}

/// Configuration for synthetic edge generation.
#[derive(Clone, Copy, Debug)]
pub struct EdgeConfig {
    /// Nodes the edges may touch.
    pub node_count: u64,
    /// Number of edges to draw.
    pub edge_count: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

/// Draws `config.edge_count` uniform random edges.
///
/// # Errors
/// Returns [`SyntheticError::ZeroNodes`] when `node_count` is zero.
///
/// # Examples
///
/// ```
/// use colmena_benches::source::{EdgeConfig, random_edges};
///
/// let config = EdgeConfig { node_count: 10, edge_count: 25, seed: 7 };
/// let edges = random_edges(&config).expect("valid config");
/// assert_eq!(edges.len(), 25);
/// assert!(edges.iter().all(|&(p, q)| p < 10 && q < 10));
/// assert_eq!(edges, random_edges(&config).expect("valid config"));
/// ```
pub fn random_edges(config: &EdgeConfig) -> Result<Vec<(u64, u64)>, SyntheticError> {
    if config.node_count == 0 {
        return Err(SyntheticError::ZeroNodes);
    }
    let mut rng = SmallRng::seed_from_u64(config.seed);
    Ok((0..config.edge_count)
        .map(|_| {
            (
                rng.gen_range(0..config.node_count),
                rng.gen_range(0..config.node_count),
            )
        })
        .collect())
}
