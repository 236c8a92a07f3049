//! Magnetic coupling between inductors.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Result, SimError};

/// Coupling between two inductors, identified by element index.
///
/// Equality ignores the order of the two inductors.
#[derive(Debug, Clone, Copy)]
pub struct Coupling {
    inductor_a: usize,
    inductor_b: usize,
    coefficient: f64,
    inductance_a: f64,
    inductance_b: f64,
    mutual_inductance: f64,
}

impl Coupling {
    pub fn new(
        inductor_a: usize,
        inductor_b: usize,
        coefficient: f64,
        inductance_a: f64,
        inductance_b: f64,
    ) -> Self {
        Self {
            inductor_a,
            inductor_b,
            coefficient,
            inductance_a,
            inductance_b,
            mutual_inductance: mutual_inductance(coefficient, inductance_a, inductance_b),
        }
    }

    pub fn inductor_a(&self) -> usize {
        self.inductor_a
    }

    pub fn inductor_b(&self) -> usize {
        self.inductor_b
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    pub fn inductances(&self) -> (f64, f64) {
        (self.inductance_a, self.inductance_b)
    }

    pub fn mutual_inductance(&self) -> f64 {
        self.mutual_inductance
    }

    pub fn involves(&self, inductor: usize) -> bool {
        self.inductor_a == inductor || self.inductor_b == inductor
    }

    /// The other inductor of the pair, if `inductor` is part of it.
    pub fn partner(&self, inductor: usize) -> Option<usize> {
        if self.inductor_a == inductor {
            Some(self.inductor_b)
        } else if self.inductor_b == inductor {
            Some(self.inductor_a)
        } else {
            None
        }
    }

    fn key(&self) -> (usize, usize) {
        (self.inductor_a.min(self.inductor_b), self.inductor_a.max(self.inductor_b))
    }
}

impl PartialEq for Coupling {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Coupling {}

impl std::hash::Hash for Coupling {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Coupling[L{}-L{}, k={:.4}, M={:.6e}]",
            self.inductor_a, self.inductor_b, self.coefficient, self.mutual_inductance
        )
    }
}

/// `M = k * sqrt(L1 * L2)`.
pub fn mutual_inductance(k: f64, l1: f64, l2: f64) -> f64 {
    k * (l1 * l2).sqrt()
}

/// One mutual term seen from a coupled inductor's branch row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutualTerm {
    /// Branch row of the partner inductor.
    pub partner_row: usize,
    pub mutual_inductance: f64,
}

/// Per-inductor mutual terms, indexed by element index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouplingArrays {
    terms: Vec<Vec<MutualTerm>>,
}

impl CouplingArrays {
    /// Mutual terms of `inductor` (empty if uncoupled).
    pub fn terms_for(&self, inductor: usize) -> &[MutualTerm] {
        self.terms.get(inductor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.terms.iter().all(Vec::is_empty)
    }
}

/// Registry of inductor couplings for one netlist.
#[derive(Debug, Clone, Default)]
pub struct MutualCouplingRegistry {
    couplings: Vec<Coupling>,
}

impl MutualCouplingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coupling. Rejects self-coupling, non-finite `k`, non-positive
    /// inductances and duplicate pairs in either order.
    pub fn register(
        &mut self,
        inductor_a: usize,
        inductor_b: usize,
        coefficient: f64,
        inductance_a: f64,
        inductance_b: f64,
    ) -> Result<Coupling> {
        if inductor_a == inductor_b {
            return Err(SimError::invalid_coupling("cannot couple an inductor with itself"));
        }
        if !coefficient.is_finite() {
            return Err(SimError::invalid_coupling(format!(
                "invalid coupling coefficient: {}",
                coefficient
            )));
        }
        if inductance_a <= 0.0 || inductance_b <= 0.0 {
            return Err(SimError::invalid_coupling("inductance values must be positive"));
        }

        let coupling = Coupling::new(
            inductor_a,
            inductor_b,
            coefficient,
            inductance_a,
            inductance_b,
        );
        if self.couplings.contains(&coupling) {
            return Err(SimError::DuplicateCoupling {
                a: inductor_a,
                b: inductor_b,
            });
        }
        self.couplings.push(coupling);
        Ok(coupling)
    }

    fn find(&self, a: usize, b: usize) -> Option<&Coupling> {
        self.couplings.iter().find(|c| c.partner(a) == Some(b))
    }

    /// Mutual inductance of the pair, 0 when uncoupled.
    pub fn mutual_inductance(&self, a: usize, b: usize) -> f64 {
        self.find(a, b).map_or(0.0, Coupling::mutual_inductance)
    }

    pub fn coupling_coefficient(&self, a: usize, b: usize) -> Option<f64> {
        self.find(a, b).map(Coupling::coefficient)
    }

    pub fn are_coupled(&self, a: usize, b: usize) -> bool {
        self.find(a, b).is_some()
    }

    pub fn is_coupled(&self, inductor: usize) -> bool {
        self.couplings.iter().any(|c| c.involves(inductor))
    }

    pub fn couplings_for(&self, inductor: usize) -> Vec<&Coupling> {
        self.couplings.iter().filter(|c| c.involves(inductor)).collect()
    }

    pub fn coupling_partners(&self, inductor: usize) -> Vec<usize> {
        self.couplings.iter().filter_map(|c| c.partner(inductor)).collect()
    }

    pub fn all_coupled_inductors(&self) -> BTreeSet<usize> {
        self.couplings
            .iter()
            .flat_map(|c| [c.inductor_a, c.inductor_b])
            .collect()
    }

    pub fn all_couplings(&self) -> &[Coupling] {
        &self.couplings
    }

    pub fn len(&self) -> usize {
        self.couplings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.couplings.is_empty()
    }

    pub fn remove_coupling(&mut self, a: usize, b: usize) -> bool {
        let before = self.couplings.len();
        self.couplings.retain(|c| c.partner(a) != Some(b));
        self.couplings.len() != before
    }

    pub fn clear(&mut self) {
        self.couplings.clear();
    }

    /// Mutual terms per inductor, with partners given by their branch rows.
    ///
    /// `branch_rows[i]` is the branch row of element `i`.
    pub fn build_coupling_arrays(&self, branch_rows: &[usize]) -> Result<CouplingArrays> {
        let len = self.all_coupled_inductors().iter().next_back().map_or(0, |max| max + 1);
        let mut terms = vec![Vec::new(); len];
        for inductor in self.all_coupled_inductors() {
            for coupling in self.couplings_for(inductor) {
                let partner = coupling.partner(inductor).unwrap_or(inductor);
                let partner_row = branch_rows
                    .get(partner)
                    .copied()
                    .filter(|row| *row != 0)
                    .ok_or_else(|| {
                        SimError::invalid_coupling(format!(
                            "inductor {} has no branch row",
                            partner
                        ))
                    })?;
                terms[inductor].push(MutualTerm {
                    partner_row,
                    mutual_inductance: coupling.mutual_inductance(),
                });
            }
        }
        Ok(CouplingArrays { terms })
    }
}

impl fmt::Display for MutualCouplingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MutualCouplingRegistry[count={}]", self.couplings.len())?;
        for coupling in &self.couplings {
            writeln!(f, "  {}", coupling)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mutual_inductance_is_symmetric() {
        for (k, l1, l2) in [(0.9, 1e-3, 4e-3), (0.5, 2.0, 8.0), (1.0, 1e-6, 1e-6)] {
            let mut registry = MutualCouplingRegistry::new();
            registry.register(3, 5, k, l1, l2).unwrap();
            let m = registry.mutual_inductance(3, 5);
            assert_relative_eq!(m, k * (l1 * l2).sqrt());
            assert_eq!(m, registry.mutual_inductance(5, 3));
        }
    }

    #[test]
    fn test_rejects_invalid_couplings() {
        let mut registry = MutualCouplingRegistry::new();
        assert!(registry.register(1, 1, 0.5, 1.0, 1.0).is_err());
        assert!(registry.register(1, 2, f64::NAN, 1.0, 1.0).is_err());
        assert!(registry.register(1, 2, 0.5, 0.0, 1.0).is_err());
        registry.register(1, 2, 0.5, 1.0, 1.0).unwrap();
        assert!(matches!(
            registry.register(2, 1, 0.7, 1.0, 1.0),
            Err(SimError::DuplicateCoupling { a: 2, b: 1 })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_queries() {
        let mut registry = MutualCouplingRegistry::new();
        registry.register(0, 1, 0.5, 1.0, 4.0).unwrap();
        registry.register(0, 2, 0.25, 1.0, 1.0).unwrap();

        assert!(registry.are_coupled(1, 0));
        assert!(!registry.are_coupled(1, 2));
        assert_eq!(registry.mutual_inductance(1, 2), 0.0);
        assert_eq!(registry.coupling_coefficient(2, 0), Some(0.25));
        assert_eq!(registry.coupling_partners(0), vec![1, 2]);
        assert_eq!(registry.couplings_for(2).len(), 1);
        assert_eq!(registry.all_coupled_inductors().into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);

        assert!(registry.remove_coupling(2, 0));
        assert!(!registry.is_coupled(2));
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_build_coupling_arrays() {
        let mut registry = MutualCouplingRegistry::new();
        registry.register(0, 2, 0.5, 1.0, 4.0).unwrap();
        let arrays = registry.build_coupling_arrays(&[5, 0, 6]).unwrap();
        assert_eq!(
            arrays.terms_for(0),
            &[MutualTerm {
                partner_row: 6,
                mutual_inductance: 1.0
            }]
        );
        assert_eq!(arrays.terms_for(2)[0].partner_row, 5);
        assert!(arrays.terms_for(1).is_empty());
        assert!(arrays.terms_for(9).is_empty());

        assert!(registry.build_coupling_arrays(&[5]).is_err());
    }

    #[test]
    fn test_display() {
        let c = Coupling::new(1, 2, 0.9, 1e-3, 1e-3);
        assert_eq!(c.to_string(), "Coupling[L1-L2, k=0.9000, M=9.000000e-4]");
    }
}
