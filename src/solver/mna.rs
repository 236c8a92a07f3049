//! MNA system assembly and solving.

use std::collections::HashMap;

use tracing::debug;

use crate::circuit::{CouplingArrays, NetlistElement};
use crate::components::StamperRegistry;
use crate::error::{Result, SimError};

use super::big_lu::BigLuDecomposition;
use super::context::SolverContext;
use super::lu::LuDecomposition;
use super::matrix::DenseMatrix;

/// Maximum number of cached factorizations.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Arithmetic used for factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// `f64` LU.
    #[default]
    Double,
    /// Decimal LU, for badly conditioned systems.
    High,
}

/// Factorization cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
enum Factorization {
    Double(LuDecomposition),
    High(BigLuDecomposition),
}

impl Factorization {
    fn new(a: &DenseMatrix, precision: Precision) -> Result<Self> {
        let factorization = match precision {
            Precision::Double => Self::Double(LuDecomposition::new(a)?),
            Precision::High => Self::High(BigLuDecomposition::new(a)?),
        };
        if !factorization.is_nonsingular() {
            return Err(SimError::SingularMatrix);
        }
        Ok(factorization)
    }

    fn is_nonsingular(&self) -> bool {
        match self {
            Self::Double(lu) => lu.is_nonsingular(),
            Self::High(lu) => lu.is_nonsingular(),
        }
    }

    fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        match self {
            Self::Double(lu) => lu.solve(b),
            Self::High(lu) => lu.solve(b),
        }
    }
}

/// Conduction pattern of the switching elements, in element order.
///
/// For a fixed step width the system matrix depends only on this pattern,
/// so it keys the factorization cache.
pub fn switch_signature(elements: &[NetlistElement]) -> Vec<bool> {
    elements
        .iter()
        .filter(|e| e.device.is_switch())
        .map(NetlistElement::is_conducting)
        .collect()
}

/// MNA system `A·p = b` including the ground row.
///
/// Row and column 0 belong to ground; they are assembled like every other
/// row but dropped before factorization, and the solution has `p[0] = 0`.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    a: DenseMatrix,
    b: Vec<f64>,
    precision: Precision,
    cache: HashMap<Vec<bool>, Factorization>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl MnaSystem {
    /// System with `size` rows (ground included).
    pub fn new(size: usize) -> Self {
        Self {
            a: DenseMatrix::square(size),
            b: vec![0.0; size],
            precision: Precision::Double,
            cache: HashMap::new(),
            capacity: DEFAULT_CACHE_CAPACITY,
            hits: 0,
            misses: 0,
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Cache capacity. 0 disables caching.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn size(&self) -> usize {
        self.b.len()
    }

    pub fn matrix(&self) -> &DenseMatrix {
        &self.a
    }

    pub fn matrix_mut(&mut self) -> &mut DenseMatrix {
        &mut self.a
    }

    pub fn rhs(&self) -> &[f64] {
        &self.b
    }

    pub fn rhs_mut(&mut self) -> &mut [f64] {
        &mut self.b
    }

    /// Stamp the system matrix of all elements, plus mutual inductance terms.
    pub fn assemble_matrix(
        &mut self,
        elements: &[NetlistElement],
        registry: &StamperRegistry,
        ctx: &SolverContext,
        couplings: &CouplingArrays,
    ) -> Result<()> {
        self.a.clear();
        for element in elements {
            let stamper = registry.get_required(element.device)?;
            stamper.stamp_matrix(&mut self.a, element.nodes, &element.params, ctx);
        }

        for (idx, element) in elements.iter().enumerate() {
            let z = element.nodes.z;
            if z == 0 {
                continue;
            }
            for term in couplings.terms_for(idx) {
                self.a.add(z, term.partner_row, -ctx.inductor_impedance(term.mutual_inductance));
            }
        }
        Ok(())
    }

    /// Stamp the right-hand side at `time`.
    ///
    /// `p_alt` is the previous accepted solution; it supplies the partner
    /// currents of the mutual inductance history terms.
    pub fn assemble_vector(
        &mut self,
        elements: &[NetlistElement],
        registry: &StamperRegistry,
        ctx: &SolverContext,
        couplings: &CouplingArrays,
        time: f64,
        p_alt: &[f64],
    ) -> Result<()> {
        self.b.fill(0.0);
        for element in elements {
            let stamper = registry.get_required(element.device)?;
            stamper.stamp_vector(
                &mut self.b,
                element.nodes,
                &element.params,
                ctx,
                time,
                element.history,
            );
        }

        for (idx, element) in elements.iter().enumerate() {
            let z = element.nodes.z;
            if z == 0 {
                continue;
            }
            for term in couplings.terms_for(idx) {
                let previous = p_alt.get(term.partner_row).copied().unwrap_or(0.0);
                self.b[z] -= ctx.inductor_impedance(term.mutual_inductance) * previous;
            }
        }
        Ok(())
    }

    /// Solve with a cached factorization for this switch `signature`.
    pub fn solve(&mut self, signature: &[bool]) -> Result<Vec<f64>> {
        if self.capacity == 0 || self.b.len() < 2 {
            return self.solve_uncached();
        }

        if let Some(factorization) = self.cache.get(signature) {
            self.hits += 1;
            return expand(factorization.solve(&self.b[1..])?);
        }

        self.misses += 1;
        let factorization = Factorization::new(&self.a.without_ground(), self.precision)?;
        let solution = expand(factorization.solve(&self.b[1..])?);
        if self.cache.len() >= self.capacity {
            debug!(entries = self.cache.len(), "factorization cache full, clearing");
            self.cache.clear();
        }
        debug!(signature = ?signature, entries = self.cache.len() + 1, "factorization cache miss");
        self.cache.insert(signature.to_vec(), factorization);
        solution
    }

    /// Factor and solve the present matrix without touching the cache.
    pub fn solve_uncached(&self) -> Result<Vec<f64>> {
        if self.b.len() < 2 {
            return Ok(vec![0.0; self.b.len()]);
        }
        let factorization = Factorization::new(&self.a.without_ground(), self.precision)?;
        expand(factorization.solve(&self.b[1..])?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.cache.len(),
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Re-insert the ground potential in front of a reduced solution.
///
/// A non-finite entry means the factorization was numerically singular.
fn expand(reduced: Vec<f64>) -> Result<Vec<f64>> {
    if let Some(bad) = reduced.iter().find(|v| !v.is_finite()) {
        debug!(value = %bad, "non-finite solution");
        return Err(SimError::SingularMatrix);
    }
    let mut full = Vec::with_capacity(reduced.len() + 1);
    full.push(0.0);
    full.extend(reduced);
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DeviceType, Terminals, VoltageSourceStamper};
    use approx::assert_relative_eq;

    fn divider() -> Vec<NetlistElement> {
        vec![
            NetlistElement::new(
                "V1",
                DeviceType::VoltageSource,
                Terminals::with_branch(1, 0, 3),
                VoltageSourceStamper::dc_parameters(10.0),
            ),
            NetlistElement::new("R1", DeviceType::Resistor, Terminals::new(1, 2), vec![1000.0]),
            NetlistElement::new("R2", DeviceType::Resistor, Terminals::new(2, 0), vec![1000.0]),
        ]
    }

    fn assemble(system: &mut MnaSystem, elements: &[NetlistElement]) {
        let registry = StamperRegistry::with_defaults();
        let ctx = SolverContext::backward_euler(1e-6).unwrap();
        let couplings = CouplingArrays::default();
        system.assemble_matrix(elements, &registry, &ctx, &couplings).unwrap();
        system
            .assemble_vector(elements, &registry, &ctx, &couplings, 0.0, &[0.0; 4])
            .unwrap();
    }

    #[test]
    fn test_voltage_divider() {
        let elements = divider();
        let mut system = MnaSystem::new(4);
        assemble(&mut system, &elements);
        let p = system.solve(&[]).unwrap();
        assert_eq!(p[0], 0.0);
        assert_relative_eq!(p[1], 10.0, epsilon = 1e-9);
        assert_relative_eq!(p[2], 5.0, epsilon = 1e-9);
        // Branch current flows x -> y inside the source
        assert_relative_eq!(p[3], -0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_cache_hits() {
        let elements = divider();
        let mut system = MnaSystem::new(4);
        assemble(&mut system, &elements);
        system.solve(&[true]).unwrap();
        system.solve(&[true]).unwrap();
        system.solve(&[false]).unwrap();
        let stats = system.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
        assert_relative_eq!(stats.hit_rate(), 1.0 / 3.0);
    }

    #[test]
    fn test_high_precision_matches_double() {
        let elements = divider();
        let mut system = MnaSystem::new(4).with_precision(Precision::High);
        assemble(&mut system, &elements);
        let p = system.solve_uncached().unwrap();
        assert_relative_eq!(p[2], 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_floating_node_is_singular() {
        let elements = vec![NetlistElement::new(
            "R1",
            DeviceType::Resistor,
            Terminals::new(1, 2),
            vec![1000.0],
        )];
        let mut system = MnaSystem::new(3);
        assemble(&mut system, &elements);
        assert!(matches!(system.solve(&[]), Err(SimError::SingularMatrix)));
        assert_eq!(system.cache_stats().entries, 0);
    }

    #[test]
    fn test_non_finite_solution_is_singular() {
        assert!(matches!(expand(vec![1.0, f64::NAN]), Err(SimError::SingularMatrix)));
        assert!(matches!(expand(vec![f64::INFINITY]), Err(SimError::SingularMatrix)));
        assert_eq!(expand(vec![2.0]).unwrap(), vec![0.0, 2.0]);
    }
}
