//! Potential and current histories carried between time steps.

/// Node-potential and branch-current history of a running simulation.
///
/// Potentials are indexed by matrix row (ground at 0), currents by element
/// index. `*_alt` is the previous accepted step, `*_alt_alt` the one before.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixStateArrays {
    pub p: Vec<f64>,
    pub p_alt: Vec<f64>,
    pub p_alt_alt: Vec<f64>,
    pub p_alt_alt_alt: Vec<f64>,
    pub i_alt: Vec<f64>,
    pub i_alt_alt: Vec<f64>,
    pub i_alt_alt_alt: Vec<f64>,
}

impl MatrixStateArrays {
    /// Zeroed arrays for a system of `matrix_size` rows and `element_count` elements.
    pub fn new(matrix_size: usize, element_count: usize) -> Self {
        Self {
            p: vec![0.0; matrix_size],
            p_alt: vec![0.0; matrix_size],
            p_alt_alt: vec![0.0; matrix_size],
            p_alt_alt_alt: vec![0.0; matrix_size],
            i_alt: vec![0.0; element_count],
            i_alt_alt: vec![0.0; element_count],
            i_alt_alt_alt: vec![0.0; element_count],
        }
    }

    pub fn matrix_size(&self) -> usize {
        self.p.len()
    }

    pub fn element_count(&self) -> usize {
        self.i_alt.len()
    }

    /// Zero every potential history.
    pub fn clear_potentials(&mut self) {
        self.p.fill(0.0);
        self.p_alt.fill(0.0);
        self.p_alt_alt.fill(0.0);
        self.p_alt_alt_alt.fill(0.0);
    }

    /// Use one solution as the whole potential history.
    ///
    /// Extra trailing entries of `solution` (auxiliary rows) are ignored.
    pub fn fill_potentials(&mut self, solution: &[f64]) {
        let n = self.p.len().min(solution.len());
        for history in [
            &mut self.p,
            &mut self.p_alt,
            &mut self.p_alt_alt,
            &mut self.p_alt_alt_alt,
        ] {
            history[..n].copy_from_slice(&solution[..n]);
        }
        self.pin_ground();
    }

    /// Accept a step: age the histories and store the new solution and currents.
    pub fn commit(&mut self, solution: &[f64], currents: &[f64]) {
        std::mem::swap(&mut self.p_alt_alt_alt, &mut self.p_alt_alt);
        std::mem::swap(&mut self.p_alt_alt, &mut self.p_alt);
        let n = self.p.len().min(solution.len());
        self.p[..n].copy_from_slice(&solution[..n]);
        self.p_alt.copy_from_slice(&self.p);

        std::mem::swap(&mut self.i_alt_alt_alt, &mut self.i_alt_alt);
        std::mem::swap(&mut self.i_alt_alt, &mut self.i_alt);
        let m = self.i_alt.len().min(currents.len());
        self.i_alt[..m].copy_from_slice(&currents[..m]);
        self.pin_ground();
    }

    /// Seed every potential history of one row.
    pub fn set_potential(&mut self, row: usize, value: f64) {
        if row == 0 {
            return;
        }
        for history in [
            &mut self.p,
            &mut self.p_alt,
            &mut self.p_alt_alt,
            &mut self.p_alt_alt_alt,
        ] {
            if let Some(slot) = history.get_mut(row) {
                *slot = value;
            }
        }
    }

    /// Seed every current history of one element.
    pub fn set_current(&mut self, element: usize, value: f64) {
        for history in [&mut self.i_alt, &mut self.i_alt_alt, &mut self.i_alt_alt_alt] {
            if let Some(slot) = history.get_mut(element) {
                *slot = value;
            }
        }
    }

    /// Voltage between two matrix indices in the previous step.
    pub fn previous_voltage(&self, x: usize, y: usize) -> f64 {
        self.p_alt[x] - self.p_alt[y]
    }

    fn pin_ground(&mut self) {
        for history in [
            &mut self.p,
            &mut self.p_alt,
            &mut self.p_alt_alt,
            &mut self.p_alt_alt_alt,
        ] {
            if let Some(ground) = history.first_mut() {
                *ground = 0.0;
            }
        }
    }
}
